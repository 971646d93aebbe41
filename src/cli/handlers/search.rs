// src/cli/handlers/search.rs

use crate::{cli::console::Console, core::surface::SessionSurface};
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Searches the project's files.")]
struct GrepArgs {
    /// Words are joined with single spaces into one pattern.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pattern: Vec<String>,
}

/// The handler for `grep`.
pub fn handle(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = GrepArgs::try_parse_from(&args)?;
    let pattern = args.pattern.join(" ");
    let context = console.view.project.context();
    console.surface.search(context, &pattern)
}
