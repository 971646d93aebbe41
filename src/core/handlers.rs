// src/core/handlers.rs

//! Built-in completion handlers.

use crate::core::{
    dispatcher::{Completion, CompletionHandler},
    output::{self, OutputMode},
};
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::fs;

/// Fixture directory used when the record names none.
pub const DEFAULT_DUMP_DIR: &str = "fixtures";

/// Writes the output of a successful `dumpdata` to
/// `<root>/<dump_dir>/<app|all>.<format>`.
///
/// If the record carries a `sentinel` pattern, only the output after the first
/// matching line is written. Output that was not captured in full is never
/// written.
#[derive(Debug, Default)]
pub struct DumpdataHandler;

impl CompletionHandler for DumpdataHandler {
    fn on_complete(&self, completion: &Completion<'_>) -> Result<Option<String>> {
        if !completion.success {
            return Ok(None);
        }
        let record = completion.record;
        let format = record.get("format").filter(|f| !f.is_empty()).unwrap_or("json");
        let app = record.get("app").filter(|a| !a.is_empty()).unwrap_or("all");
        let dump_dir = record
            .get("dump_dir")
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DUMP_DIR);

        let buffer = &completion.session.output;
        if buffer.mode() != OutputMode::Capture || buffer.dropped() > 0 {
            bail!(
                "Output of '{}' was not captured in full; no fixture written.",
                completion.session.id
            );
        }

        let text = buffer.text();
        let content = match record.get("sentinel") {
            Some(pattern) => {
                let sentinel = Regex::new(pattern)
                    .with_context(|| format!("Invalid sentinel pattern '{}'", pattern))?;
                output::content_after_sentinel(&text, &sentinel).to_string()
            }
            None => text,
        };

        let dir = completion.session.context.root.join(dump_dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;
        let path = dir.join(format!("{}.{}", app, format));
        fs::write(&path, content).with_context(|| format!("Failed to write '{}'", path.display()))?;
        Ok(Some(format!("Fixture written to {}", path.display())))
    }
}

/// Reports where `startapp` created the new application.
#[derive(Debug, Default)]
pub struct StartappHandler;

impl CompletionHandler for StartappHandler {
    fn on_complete(&self, completion: &Completion<'_>) -> Result<Option<String>> {
        if !completion.success {
            return Ok(None);
        }
        let Some(name) = completion.record.get("app_name").filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        let dir = completion.session.context.root.join(name);
        Ok(Some(format!("Application '{}' created in {}", name, dir.display())))
    }
}

/// Tells the operator whether the test run passed.
#[derive(Debug, Default)]
pub struct TestHandler;

impl CompletionHandler for TestHandler {
    fn on_complete(&self, completion: &Completion<'_>) -> Result<Option<String>> {
        let target = completion
            .record
            .get("app")
            .filter(|a| !a.is_empty())
            .unwrap_or("all applications");
        let message = if completion.success {
            format!("Tests passed for {}.", target)
        } else {
            format!(
                "Tests failed for {} ({}).",
                target,
                completion.session.exit_status.as_deref().unwrap_or("unknown status")
            )
        };
        Ok(Some(message))
    }
}
