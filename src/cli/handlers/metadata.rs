// src/cli/handlers/metadata.rs

use crate::{cli::console::Console, core::metadata};
use anyhow::Result;
use clap::Parser;
use colored::*;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Shows the value of a project setting.")]
struct SettingArgs {
    /// The setting name, e.g. `INSTALLED_APPS`.
    name: String,
    /// Ask the project again instead of using the cached value.
    #[arg(long, short)]
    refresh: bool,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Shows where an application lives on disk.")]
struct AppPathArgs {
    app: String,
}

/// The handler for `setting`.
pub fn handle_setting(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = SettingArgs::try_parse_from(&args)?;
    let value = console
        .view
        .project
        .metadata_mut()
        .get_setting(&args.name, args.refresh)?;
    println!("{} = {}", args.name.cyan(), render(&value));
    Ok(())
}

/// The handler for `app-path`.
pub fn handle_app_path(args: Vec<String>, console: &mut Console) -> Result<()> {
    let args = AppPathArgs::try_parse_from(&args)?;
    let path = console.view.project.metadata_mut().get_app_path(&args.app)?;
    println!("{} {}", args.app.cyan(), path.display());
    Ok(())
}

/// Scalars inline, structures pretty-printed.
fn render(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        scalar => metadata::setting_to_string(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_scalars_bare_and_structures_pretty() {
        assert_eq!(render(&json!("blog.urls")), "blog.urls");
        assert_eq!(render(&json!(true)), "true");
        assert_eq!(render(&json!(["blog"])), "[\n  \"blog\"\n]");
    }
}
