// src/cli/handlers/commons.rs

// Shared helpers for the console handlers.

use crate::{
    cli::console::Console,
    core::session_runner::Session,
    models::SessionState,
};
use anyhow::{Result, anyhow};
use colored::*;
use std::time::Duration;

/// The session a command targets: the explicit id, else the one under the cursor.
pub fn resolve_target(console: &Console, id: Option<String>) -> Result<String> {
    match id {
        Some(id) => {
            if console.runner.session(&id).is_none() {
                return Err(anyhow!(t!("sessions.error.unknown_session"), id = id));
            }
            Ok(id)
        }
        None => console
            .view
            .current(&console.runner)
            .ok_or_else(|| anyhow!(t!("sessions.error.no_sessions"))),
    }
}

/// `1h02m`, `3m05s` or `12s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// A colored one-word state for listings.
pub fn state_label(session: &Session) -> ColoredString {
    match session.state {
        SessionState::Running => t!("sessions.state.running").yellow(),
        SessionState::Succeeded => t!("sessions.state.succeeded").green(),
        SessionState::Failed => t!("sessions.state.failed").red(),
    }
}

/// Prints a titled list, or the `empty` notice.
pub fn print_list<S: AsRef<str>>(title: &str, items: &[S], empty: &str) {
    if items.is_empty() {
        println!("{}", empty.dimmed());
        return;
    }
    println!("{}", title.bold());
    for item in items {
        println!("  {}", item.as_ref());
    }
}
