// src/cli/mod.rs

use clap::Parser;
use std::path::PathBuf;

pub mod console;
pub mod dispatcher;
pub mod handlers;
pub mod surface;

/// Builds the color-aware help string at runtime.
fn build_help_string() -> &'static str {
    // Mini-renderer for the semantic tags of the help template.
    let use_colors = colored::control::SHOULD_COLORIZE.should_colorize();

    let template = t!("cli.help.template");

    let title = if use_colors { "\x1b[1;33m" } else { "" }; // Bold Yellow
    let hl = if use_colors { "\x1b[1;36m" } else { "" }; // Bold Cyan
    let cmd = if use_colors { "\x1b[36m" } else { "" }; // Cyan
    let group = if use_colors { "\x1b[1;32m" } else { "" }; // Bold Green
    let dim = if use_colors { "\x1b[2m" } else { "" };
    let reset = if use_colors { "\x1b[0m" } else { "" };

    let formatted_string = template
        .replace("<title>", title)
        .replace("</title>", reset)
        .replace("<hl>", hl)
        .replace("</hl>", reset)
        .replace("<cmd>", cmd)
        .replace("</cmd>", reset)
        .replace("<group>", group)
        .replace("</group>", reset)
        .replace("<dim>", dim)
        .replace("</dim>", reset);

    Box::leak(formatted_string.into_boxed_str())
}

/// djctl: drives a project's management commands as tracked background sessions.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    help_template = { build_help_string() },
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// A directory inside the project. Defaults to the current directory.
    pub path: Option<PathBuf>,

    /// Settings module to use, e.g. `mysite.settings.dev`.
    #[arg(long, value_name = "MODULE")]
    pub settings: Option<String>,

    /// Interpreter that runs the entry point. Overrides the configuration.
    #[arg(long, value_name = "PATH")]
    pub interpreter: Option<String>,

    /// Ask for every quick-command argument, even those with a default.
    #[arg(long)]
    pub always_prompt: bool,

    /// Print the project's management commands and exit.
    #[arg(long)]
    pub list: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "djctl",
            "/srv/blog",
            "--settings",
            "blog.settings.dev",
            "--always-prompt",
        ])
        .unwrap();
        assert_eq!(cli.path, Some(PathBuf::from("/srv/blog")));
        assert_eq!(cli.settings.as_deref(), Some("blog.settings.dev"));
        assert!(cli.always_prompt);
        assert!(!cli.list);
        assert_eq!(cli.interpreter, None);
    }
}
