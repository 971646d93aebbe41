// src/cli/console.rs

//! The interactive operator console.
//!
//! One loop on the control thread: read a line, dispatch it to the command
//! table, then apply whatever the session tasks reported in the meantime.

use crate::{
    cli::{dispatcher, surface::TerminalSurface},
    core::{
        config::{AppConfig, ConfigError},
        dispatcher::{CallbackDispatcher, DispatchReport},
        project::ProjectView,
        prompt::TerminalPrompter,
        quick_commands::QuickCommandTable,
        session_runner::{EventOutcome, RunError, SessionRunner},
        surface::SessionSurface,
    },
};
use anyhow::Result;
use colored::*;
use dialoguer::{Input, theme::ColorfulTheme};
use std::{
    io::{self, Write},
    sync::Arc,
};
use tokio::runtime::Handle;

/// Everything the console commands operate on.
#[derive(Debug)]
pub struct Console {
    pub(crate) view: ProjectView,
    pub(crate) runner: SessionRunner,
    pub(crate) dispatcher: CallbackDispatcher,
    pub(crate) quick: QuickCommandTable,
    pub(crate) surface: Arc<TerminalSurface>,
    pub(crate) prompter: TerminalPrompter,
    pub(crate) runtime: Handle,
    pub(crate) always_prompt: bool,
    /// Session whose output is echoed as it arrives.
    pub(crate) follow: Option<String>,
    running: bool,
}

impl Console {
    pub fn new(
        view: ProjectView,
        runtime: Handle,
        config: &AppConfig,
        always_prompt: bool,
    ) -> Result<Self, ConfigError> {
        let quick = config.quick_command_table()?;
        let surface = Arc::new(TerminalSurface::new(&config.search_command));
        let shared: Arc<dyn SessionSurface> = surface.clone();
        let runner = SessionRunner::new(runtime.clone(), shared, config.output_max_lines);
        Ok(Self {
            view,
            runner,
            dispatcher: CallbackDispatcher::builtin(),
            quick,
            surface,
            prompter: TerminalPrompter,
            runtime,
            always_prompt: always_prompt || config.always_prompt,
            follow: None,
            running: true,
        })
    }

    /// Runs until `quit`, then tears down every session of the project.
    pub fn run(&mut self) -> Result<()> {
        let context = Arc::clone(self.view.project.context());
        println!(
            "{} {} ({})",
            t!("console.banner").bold(),
            context.name.cyan().bold(),
            context.settings_module.dimmed()
        );
        println!("{}", t!("console.banner_hint").dimmed());

        let theme = ColorfulTheme::default();
        while self.running {
            self.drain_events();
            let line: String = Input::with_theme(&theme)
                .with_prompt(self.prompt_label())
                .allow_empty(true)
                .interact_text()?;
            self.execute_line(&line);
            self.drain_events();
        }

        let closed = self.runner.close_project(&context);
        if closed > 0 {
            println!("{}", format!(t!("console.closed_sessions"), count = closed).dimmed());
        }
        Ok(())
    }

    /// Splits one input line and runs it. Errors are reported, never returned.
    pub(crate) fn execute_line(&mut self, line: &str) {
        let Some(words) = shlex::split(line) else {
            println!("{}", t!("console.notice.bad_quoting").yellow());
            return;
        };
        let Some((name, args)) = words.split_first() else {
            return;
        };
        match dispatcher::dispatch(name, args.to_vec(), self) {
            Ok(true) => {}
            Ok(false) => println!(
                "{}",
                format!(t!("console.notice.unknown_command"), name = name).yellow()
            ),
            Err(e) => report_error(&e),
        }
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    fn prompt_label(&self) -> String {
        let context = self.view.project.context();
        let running = self
            .runner
            .sessions_of(context)
            .iter()
            .filter(|s| s.is_running())
            .count();
        if running == 0 {
            context.name.clone()
        } else {
            format!("{} [{}]", context.name, running)
        }
    }

    /// Applies every queued session event.
    pub(crate) fn drain_events(&mut self) {
        for event in self.runner.pending_events() {
            let outcome = self.runner.process_event(event, &self.dispatcher);
            self.print_outcome(outcome);
        }
    }

    pub(crate) fn print_outcome(&self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Output { id, chunk } => {
                if self.follow.as_deref() == Some(id.as_str()) {
                    print!("{}", chunk);
                    let _ = io::stdout().flush();
                }
            }
            EventOutcome::Completed {
                id,
                success,
                status,
                report,
            } => {
                let marker = if success { "✔".green() } else { "✘".red() };
                println!("{} {} {}", marker, id.bold(), status.dimmed());
                if let Some(report) = report {
                    print_report(&report);
                }
            }
            EventOutcome::Discarded => {}
        }
    }

    /// Marks a freshly started session as the followed one.
    pub(crate) fn started(&mut self, id: &str, displayed: bool) {
        self.view.focus(&self.runner, id);
        if displayed {
            self.follow = Some(id.to_string());
        }
    }
}

fn print_report(report: &DispatchReport) {
    match &report.outcome {
        Ok(Some(message)) => println!("  {}", message.cyan()),
        Ok(None) => {}
        Err(e) => println!(
            "  {}",
            format!(t!("console.error.handler_failed"), command = report.command, error = e).red()
        ),
    }
}

/// Prints a console error. Unavailable commands and usage errors are notices.
pub(crate) fn report_error(e: &anyhow::Error) {
    if let Some(RunError::Unavailable(unavailable)) = e.downcast_ref::<RunError>() {
        println!("{}", unavailable.to_string().yellow());
        return;
    }
    if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
        let _ = clap_err.print();
        return;
    }
    log::debug!("Console command failed: {:?}", e);
    eprintln!("{}: {:#}", "Error".red().bold(), e);
}
