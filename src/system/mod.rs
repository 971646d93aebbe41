//! # System Interaction Layer
//!
//! The boundary between the orchestration engine and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: describes external program calls (`Invocation`) and runs the
//!   blocking ones, capturing their output. Tracked sessions reuse the same
//!   description to build their asynchronous command.
//! - **`environment`**: composes the environment the management entry point runs
//!   with (settings module, import path) and resolves the interpreter.

pub mod environment;
pub mod executor;
