// src/constants.rs

//! Names and fixed values shared across the crate.

/// The name of the directory holding djctl's user configuration (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "djctl";

/// The name of the user configuration file (inside the config directory).
pub const CONFIG_FILENAME: &str = "config.toml";

/// The conventional name of a project's management entry point.
pub const ENTRY_POINT_FILENAME: &str = "manage.py";

/// The environment variable naming the settings module for the external program.
pub const SETTINGS_ENV_VAR: &str = "DJANGO_SETTINGS_MODULE";

/// The environment variable holding the interpreter's import path.
pub const IMPORT_PATH_ENV_VAR: &str = "PYTHONPATH";

/// The environment variable used to turn off colored management output.
pub const COLORS_ENV_VAR: &str = "DJANGO_COLORS";

/// Help output anchor that precedes the subcommand listing.
pub const USAGE_ANCHOR: &str = "Usage:";

/// Help output anchor after which subcommands are listed, one per indented line.
pub const SUBCOMMANDS_ANCHOR: &str = "Available subcommands:";

/// The status string an exit notification carries for a clean exit.
pub const FINISHED_STATUS: &str = "finished";

/// Binding names a quick-command argument may not use.
pub const RESERVED_BINDINGS: &[&str] = &["command", "root", "name", "settings"];

/// Default number of lines a truncating session keeps.
pub const DEFAULT_OUTPUT_MAX_LINES: usize = 1024;

/// Default interpreter used to run the entry point.
pub const DEFAULT_INTERPRETER: &str = "python";

/// Default search command. `{pattern}` and `{root}` are replaced (shell-quoted) at call time.
pub const DEFAULT_SEARCH_COMMAND: &str = "grep -rnI --include=*.py --include=*.html {pattern} {root}";
