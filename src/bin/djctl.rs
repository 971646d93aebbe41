// src/bin/djctl.rs

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use djctl::{
    cli::{Cli, console::Console},
    core::{
        config,
        project::{self, Project, ProjectView},
        session_runner::RunError,
    },
    system::environment,
    t,
};
use std::env;

/// Sets up logging, runs the console and handles every error in one place.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        if let Some(RunError::Unavailable(unavailable)) = e.downcast_ref::<RunError>() {
            println!("{}", unavailable.to_string().yellow());
            std::process::exit(2);
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let config = config::load_config()?;
    let interpreter_template = cli.interpreter.as_deref().unwrap_or(&config.interpreter);
    let interpreter = environment::resolve_interpreter(interpreter_template)?;
    log::debug!("Using interpreter '{}'.", interpreter.display());

    let start = match cli.path {
        Some(path) => path,
        None => env::current_dir().context(t!("main.error.no_cwd"))?,
    };
    let context = project::discover_project(&start, cli.settings.as_deref())?;
    let mut project = Project::open(context, interpreter);

    if cli.list {
        for command in project.list_commands(false)? {
            println!("{}", command);
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context(t!("main.error.runtime"))?;
    let mut console = Console::new(
        ProjectView::new(project),
        runtime.handle().clone(),
        &config,
        cli.always_prompt,
    )?;
    console.run()
}
