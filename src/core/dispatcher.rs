// src/core/dispatcher.rs

//! Completion handling: when a session reaches its terminal state, the handler
//! registered for its command (if any) is run once with the collected values.

use crate::{
    constants::FINISHED_STATUS,
    core::{handlers, session_runner::Session},
    models::ArgumentRecord,
};
use std::collections::HashMap;

/// Whether an exit status string reports a clean exit.
pub fn is_success_status(status: &str) -> bool {
    status.trim() == FINISHED_STATUS
}

/// Strips CLI syntax from a value: `--name=value` and `-xvalue` / `-x=value`
/// become `value`. Anything else is returned unchanged.
///
/// The single-dash form only applies when the second character is a letter,
/// so negative numbers survive.
pub fn normalize_value(value: &str) -> &str {
    if let Some(long) = value.strip_prefix("--") {
        return match long.split_once('=') {
            Some((name, bare)) if !name.is_empty() => bare,
            _ => value,
        };
    }
    let mut chars = value.chars();
    if chars.next() == Some('-')
        && let Some(flag) = chars.next()
        && flag.is_ascii_alphabetic()
    {
        let rest = chars.as_str();
        return rest.strip_prefix('=').unwrap_or(rest);
    }
    value
}

/// What a handler sees.
#[derive(Debug)]
pub struct Completion<'a> {
    pub session: &'a Session,
    pub success: bool,
    /// `command`, then every bound argument (normalized), then spec metadata.
    pub record: &'a ArgumentRecord,
}

/// Post-processing for one command. Returns a message for the operator, if any.
pub trait CompletionHandler {
    fn on_complete(&self, completion: &Completion<'_>) -> anyhow::Result<Option<String>>;
}

/// The outcome of running a handler.
#[derive(Debug)]
pub struct DispatchReport {
    pub session_id: String,
    pub command: String,
    pub outcome: Result<Option<String>, String>,
}

/// Command name → completion handler.
#[derive(Default)]
pub struct CallbackDispatcher {
    handlers: HashMap<String, Box<dyn CompletionHandler>>,
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.handlers.keys().collect();
        commands.sort();
        f.debug_struct("CallbackDispatcher")
            .field("handlers", &commands)
            .finish()
    }
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dispatcher with the handlers for `dumpdata`, `startapp` and `test`.
    pub fn builtin() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register("dumpdata", Box::new(handlers::DumpdataHandler));
        dispatcher.register("startapp", Box::new(handlers::StartappHandler));
        dispatcher.register("test", Box::new(handlers::TestHandler));
        dispatcher
    }

    pub fn register(&mut self, command: &str, handler: Box<dyn CompletionHandler>) {
        self.handlers.insert(command.to_string(), handler);
    }

    /// Runs the handler for a session that just terminated.
    ///
    /// Callers must invoke this once per terminal transition. Only sessions
    /// started with an argument payload reach a handler; a plain run of the
    /// same command does nothing.
    pub fn dispatch(&self, session: &Session, success: bool) -> Option<DispatchReport> {
        let handler = self.handlers.get(&session.command)?;
        if session.payload.is_none() {
            log::debug!(
                "Session '{}' carries no arguments; skipping the '{}' handler.",
                session.id,
                session.command
            );
            return None;
        }
        let record = build_record(session);
        let completion = Completion {
            session,
            success,
            record: &record,
        };
        let outcome = handler.on_complete(&completion).map_err(|e| format!("{:#}", e));
        if let Err(e) = &outcome {
            log::warn!("Completion handler for '{}' failed: {}", session.command, e);
        }
        Some(DispatchReport {
            session_id: session.id.clone(),
            command: session.command.clone(),
            outcome,
        })
    }
}

/// The record handed to handlers.
pub fn build_record(session: &Session) -> ArgumentRecord {
    let mut record = ArgumentRecord::new();
    record.push("command", session.command.as_str());
    if let Some(payload) = &session.payload {
        for (key, value) in payload.arguments.iter() {
            record.push(key, normalize_value(value));
        }
        for (key, value) in payload.metadata.iter() {
            record.push(key, value);
        }
    }
    record
}
