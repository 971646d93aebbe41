// src/cli/handlers/run.rs

use crate::{
    cli::console::Console,
    core::session_runner::RunOptions,
};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Runs a management command as a tracked session.")]
struct RunArgs {
    /// The management command, e.g. `migrate`.
    command: String,
    /// Passed to the command unchanged.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Runs a quick command, or lists them.")]
struct QuickArgs {
    /// The quick command. Omit it to list every quick command.
    name: Option<String>,
    /// Ask for every argument, even those with a default.
    #[arg(long, short = 'a')]
    always_prompt: bool,
}

/// The handler for `run`.
pub fn handle_run(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = RunArgs::try_parse_from(&args)?;
    let id = console.runner.run(
        &mut console.view.project,
        &args.command,
        &args.args,
        RunOptions::default(),
    )?;
    console.started(&id, true);
    Ok(())
}

/// The handler for `q`: collects a quick command's arguments and runs it.
pub fn handle_quick(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = QuickArgs::try_parse_from(&args)?;
    let Some(name) = args.name else {
        print_quick_commands(console);
        return Ok(());
    };

    let compiled = console
        .quick
        .get(&name)
        .ok_or_else(|| anyhow!(t!("quick.error.unknown"), name = name))?;
    let always_prompt = args.always_prompt || console.always_prompt;
    let record = {
        let mut env = console.view.project.collect_env(&mut console.prompter);
        compiled.collect(&mut env, always_prompt)?
    };

    let line = compiled.command_line(&record);
    let command_args =
        shlex::split(&line).ok_or_else(|| anyhow!(t!("quick.error.bad_line"), line = line))?;
    let options = RunOptions {
        capture_output: compiled.capture_output(),
        suppress_display: compiled.suppress_display(),
        payload: Some(compiled.payload(record)),
    };
    let displayed = !options.suppress_display;
    let id = console.runner.run(
        &mut console.view.project,
        compiled.command(),
        &command_args,
        options,
    )?;
    console.started(&id, displayed);
    Ok(())
}

fn print_quick_commands(console: &Console) {
    println!("{}", t!("quick.header").bold());
    let width = console.quick.names().map(str::len).max().unwrap_or(0);
    for compiled in console.quick.iter() {
        let summary = compiled
            .description()
            .map(str::to_string)
            .unwrap_or_else(|| compiled.command().to_string());
        println!(
            "  {:<width$}  {}",
            compiled.name().cyan(),
            summary.dimmed(),
            width = width
        );
    }
}
