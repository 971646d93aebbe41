// src/cli/handlers/general.rs

use crate::cli::{console::Console, dispatcher::COMMAND_REGISTRY};
use anyhow::Result;
use colored::*;

/// The handler for `help`.
pub fn handle_help(_args: Vec<String>, _console: &mut Console) -> Result<()> {
    println!("{}", t!("console.help.header").bold());
    for command in COMMAND_REGISTRY {
        let names = if command.aliases.is_empty() {
            command.name.to_string()
        } else {
            format!("{} ({})", command.name, command.aliases.join(", "))
        };
        println!("  {:<22} {}", names.cyan(), command.summary);
    }
    println!("{}", t!("console.help.footer").dimmed());
    Ok(())
}

/// The handler for `quit`.
pub fn handle_quit(_args: Vec<String>, console: &mut Console) -> Result<()> {
    console.stop();
    Ok(())
}
