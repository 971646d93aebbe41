// src/cli/handlers/catalog.rs

use crate::cli::{console::Console, handlers::commons};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists the project's management commands.")]
struct CommandsArgs {
    /// Ask the project again instead of using the cached list.
    #[arg(long, short)]
    refresh: bool,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Forgets the cached commands and settings.")]
struct ReloadArgs {}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Lists the long options a management command accepts.")]
struct ArgsArgs {
    command: String,
}

/// The handler for `commands`.
pub fn handle_commands(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = CommandsArgs::try_parse_from(&args)?;
    let commands = console.view.project.list_commands(args.refresh)?;
    let title = format!(t!("catalog.header.commands"), count = commands.len());
    println!("{}", title.bold());
    for line in columns(commands, 4) {
        println!("  {}", line);
    }
    Ok(())
}

/// The handler for `args`.
pub fn handle_args(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = ArgsArgs::try_parse_from(&args)?;
    let flags = console.view.project.list_command_args(&args.command)?;
    commons::print_list(
        &format!(t!("catalog.header.args"), command = args.command.cyan()),
        flags,
        t!("catalog.notice.no_args"),
    );
    Ok(())
}

/// The handler for `reload`: drops every cached command list and setting.
pub fn handle_reload(args: Vec<String>, console: &mut Console) -> Result<()> {
    ReloadArgs::try_parse_from(&args)?;
    console.view.project.invalidate();
    println!("{}", t!("catalog.notice.reloaded").dimmed());
    Ok(())
}

/// Lays names out in `per_row` padded columns.
fn columns(names: &[String], per_row: usize) -> Vec<String> {
    let width = names.iter().map(String::len).max().unwrap_or(0) + 2;
    names
        .chunks(per_row.max(1))
        .map(|row| {
            row.iter()
                .map(|name| format!("{:<width$}", name, width = width))
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_pad_to_longest_name() {
        let names: Vec<String> = ["check", "migrate", "shell"].iter().map(|s| s.to_string()).collect();
        let rows = columns(&names, 2);
        assert_eq!(rows, vec!["check    migrate".to_string(), "shell".to_string()]);
    }

    #[test]
    fn test_commands_args_parse_refresh() {
        assert!(CommandsArgs::try_parse_from(["--refresh"]).unwrap().refresh);
        assert!(!CommandsArgs::try_parse_from(Vec::<String>::new()).unwrap().refresh);
    }
}
