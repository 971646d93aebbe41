//! # djctl
//!
//! An interactive front-end that drives a web project's management commands
//! (`manage.py <command>`) as tracked background sessions.
//!
//! The crate is split the same way the binary uses it:
//!
//! - **`system`**: process execution and the environment handed to the external program.
//! - **`core`**: the orchestration engine (catalog discovery, quick-command compilation,
//!   session running, the per-project registry and completion callbacks).
//! - **`cli`**: the operator console built on top of the engine.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod system;
