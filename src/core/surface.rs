// src/core/surface.rs

use crate::{core::session_runner::Session, models::ProjectContext};

/// Where sessions are shown to the operator.
///
/// The runner calls `show` when a session starts (unless display is suppressed)
/// and `detach` right before a session is destroyed.
pub trait SessionSurface {
    fn show(&self, session: &Session);

    fn detach(&self, id: &str);

    /// Searches the project's files for `pattern`.
    fn search(&self, context: &ProjectContext, pattern: &str) -> anyhow::Result<()>;
}
