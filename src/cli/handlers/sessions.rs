// src/cli/handlers/sessions.rs

use crate::cli::{console::Console, handlers::commons};
use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
struct NoArgs {}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Targets one session; defaults to the one under the cursor.")]
struct TargetArgs {
    id: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Prints a session's output and follows it.")]
struct ShowArgs {
    id: Option<String>,
    /// Only the last N lines.
    #[arg(long, short = 'n', value_name = "N")]
    lines: Option<usize>,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Writes a line to an interactive session.")]
struct SendArgs {
    /// Session to write to. Defaults to the one under the cursor.
    #[arg(long, short)]
    session: Option<String>,
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Kills a session.")]
struct KillArgs {
    id: Option<String>,
    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Kills every session of the project, or those of one command.")]
struct KillAllArgs {
    command: Option<String>,
    /// Do not ask for confirmation.
    #[arg(long, short)]
    yes: bool,
}

/// The handler for `sessions`.
pub fn handle_sessions(args: Vec<String>, console: &mut Console) -> Result<()> {
    NoArgs::try_parse_from(&args)?;
    let context = Arc::clone(console.view.project.context());
    let current = console.view.current(&console.runner);
    let sessions = console.runner.sessions_of(&context);
    if sessions.is_empty() {
        println!("{}", t!("sessions.notice.none").dimmed());
        return Ok(());
    }
    println!("{}", format!(t!("sessions.header"), project = context.name).bold());
    for session in sessions {
        let marker = if current.as_deref() == Some(session.id.as_str()) {
            "›".cyan().bold()
        } else {
            " ".normal()
        };
        println!(
            "{} {:<10} {:>7}  {}",
            marker,
            commons::state_label(session),
            commons::format_elapsed(session.elapsed()),
            session.id
        );
    }
    Ok(())
}

/// The handler for `show`: prints a session's buffered output and follows it.
pub fn handle_show(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = ShowArgs::try_parse_from(&args)?;
    let id = commons::resolve_target(console, args.id)?;
    console.view.focus(&console.runner, &id);
    print_session(console, &id, args.lines);
    console.follow = Some(id);
    Ok(())
}

/// The handler for `next`.
pub fn handle_next(args: Vec<String>, console: &mut Console) -> Result<()> {
    NoArgs::try_parse_from(&args)?;
    cycle(console, 1);
    Ok(())
}

/// The handler for `prev`.
pub fn handle_prev(args: Vec<String>, console: &mut Console) -> Result<()> {
    NoArgs::try_parse_from(&args)?;
    cycle(console, -1);
    Ok(())
}

fn cycle(console: &mut Console, delta: i64) {
    match console.view.cycle(&console.runner, delta) {
        Some(id) => {
            print_session(console, &id, None);
            console.follow = Some(id);
        }
        None => println!("{}", t!("sessions.notice.none").dimmed()),
    }
}

/// The handler for `wait`: follows a session until it terminates.
pub fn handle_wait(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = TargetArgs::try_parse_from(&args)?;
    let id = commons::resolve_target(console, args.id)?;
    console.drain_events();
    console.follow = Some(id.clone());
    while console.runner.session(&id).is_some_and(|s| s.is_running()) {
        let runtime = console.runtime.clone();
        let Some(event) = runtime.block_on(console.runner.next_event()) else {
            break;
        };
        let outcome = console.runner.process_event(event, &console.dispatcher);
        console.print_outcome(outcome);
    }
    Ok(())
}

/// The handler for `send`.
pub fn handle_send(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = SendArgs::try_parse_from(&args)?;
    let id = commons::resolve_target(console, args.session)?;
    let text = args.text.join(" ");
    if !console.runner.send_input(&id, &text) {
        println!("{}", format!(t!("sessions.notice.no_input"), id = id).yellow());
        return Ok(());
    }
    console.follow = Some(id);
    Ok(())
}

/// The handler for `kill`.
pub fn handle_kill(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = KillArgs::try_parse_from(&args)?;
    let id = commons::resolve_target(console, args.id)?;
    let killed = console
        .view
        .kill(&mut console.runner, &id, !args.yes, &mut console.prompter)?;
    if killed && console.follow.as_deref() == Some(id.as_str()) {
        console.follow = None;
    }
    Ok(())
}

/// The handler for `kill-all`.
pub fn handle_kill_all(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = KillAllArgs::try_parse_from(&args)?;
    let context = Arc::clone(console.view.project.context());
    let killed = console.runner.kill_all(
        &context,
        args.command.as_deref(),
        !args.yes,
        &mut console.prompter,
    )?;
    if killed > 0 {
        console.follow = None;
        console.view.cycle(&console.runner, 0);
    }
    println!("{}", format!(t!("sessions.notice.killed"), count = killed).dimmed());
    Ok(())
}

fn print_session(console: &Console, id: &str, lines: Option<usize>) {
    let Some(session) = console.runner.session(id) else {
        return;
    };
    println!(
        "{} {} {}",
        commons::state_label(session),
        session.id.bold(),
        session.exit_status.as_deref().unwrap_or_default().dimmed()
    );
    println!("  {}", session.command_line.dimmed());
    if let Some(n) = lines {
        for line in session.output.tail(n) {
            println!("{}", line);
        }
        return;
    }
    let dropped = session.output.dropped();
    if dropped > 0 {
        println!("{}", format!(t!("sessions.notice.dropped"), count = dropped).dimmed());
    }
    print!("{}", session.output.text());
}
