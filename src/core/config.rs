// src/core/config.rs

use crate::{
    constants::{DEFAULT_INTERPRETER, DEFAULT_OUTPUT_MAX_LINES, DEFAULT_SEARCH_COMMAND},
    core::{
        paths::{self, PathError},
        quick_commands::QuickCommandTable,
        spec_builder::{CommandSpec, SpecError},
    },
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Could not serialize the default configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// The user configuration (`~/.config/djctl/config.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interpreter used to run the entry point; `~` and `$VARS` are expanded.
    pub interpreter: String,
    /// Lines kept per session unless the output is captured.
    pub output_max_lines: usize,
    /// Ask for every quick-command argument, even those with a default.
    pub always_prompt: bool,
    /// Search command template; `{pattern}` and `{root}` are substituted.
    pub search_command: String,
    /// Additional quick commands, keyed by name. They replace built-ins of the
    /// same name.
    pub quick_commands: BTreeMap<String, CommandSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            output_max_lines: DEFAULT_OUTPUT_MAX_LINES,
            always_prompt: false,
            search_command: DEFAULT_SEARCH_COMMAND.to_string(),
            quick_commands: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// The built-in quick commands plus the user's own.
    pub fn quick_command_table(&self) -> Result<QuickCommandTable, SpecError> {
        let mut table = QuickCommandTable::builtin()?;
        for (name, spec) in &self.quick_commands {
            let mut spec = spec.clone();
            spec.name = name.clone();
            table.override_with(spec)?;
        }
        Ok(table)
    }
}

/// Loads the user configuration, writing the defaults on first use.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&paths::get_config_file_path()?)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        let default_config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&default_config)?;
        fs::write(path, toml_string).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("Default configuration written to '{}'.", path.display());
        return Ok(default_config);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_config(text: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = load_config_from(&path).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.is_file());
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config("interpreter = \"~/venv/bin/python\"\n").unwrap();
        assert_eq!(config.interpreter, "~/venv/bin/python");
        assert_eq!(config.output_max_lines, DEFAULT_OUTPUT_MAX_LINES);
        assert!(!config.always_prompt);
    }

    #[test]
    fn test_user_quick_commands_join_the_table() {
        let config = parse_config(
            r#"
            always_prompt = true

            [quick_commands.dump-blog]
            command = "dumpdata"
            capture_output = true
            metadata = { dump_dir = "seed" }
            args = [
              { name = "app", default = { literal = "blog" } },
              { name = "format", switch = "--format=", default = { literal = "json" } },
            ]

            [quick_commands.check]
            command = "check"
            switches = "--deploy"
            "#,
        )
        .unwrap();
        assert!(config.always_prompt);

        let table = config.quick_command_table().unwrap();
        let dump = table.get("dump-blog").unwrap();
        assert_eq!(dump.name(), "dump-blog");
        assert_eq!(dump.command(), "dumpdata");
        assert_eq!(table.get("check").unwrap().spec().switches, "--deploy");
    }

    #[test]
    fn test_broken_user_quick_command_is_reported() {
        let config = parse_config(
            r#"
            [quick_commands.bad]
            command = "check"
            args = [{ name = "root" }]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.quick_command_table(),
            Err(SpecError::ReservedIdentifier { .. })
        ));
    }

    #[test]
    fn test_invalid_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "output_max_lines = \"many\"\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse { .. })));
    }
}
