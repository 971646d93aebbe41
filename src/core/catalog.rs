// src/core/catalog.rs

use crate::{
    constants::{SUBCOMMANDS_ANCHOR, USAGE_ANCHOR},
    core::discovery::{DiscoveryError, HelpSource},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    /// One subcommand per indented line, e.g. `    migrate`.
    static ref COMMAND_LINE_RE: Regex =
        Regex::new(r"^\s+([A-Za-z][A-Za-z0-9_\-]*)\s*$").expect("valid command line regex");
    /// The options section header of a subcommand's help.
    static ref OPTIONS_ANCHOR_RE: Regex =
        Regex::new(r"(?i)^\s*(options|optional arguments)\s*:").expect("valid options regex");
    /// A long flag, optionally `=`-terminated: `--indent` or `--indent=`.
    static ref FLAG_RE: Regex =
        Regex::new(r"--[A-Za-z0-9][A-Za-z0-9_\-]*=?").expect("valid flag regex");
}

/// The discovered subcommands of one project, and the flags of each one.
///
/// Both lists are filled lazily and kept until [`CommandCatalog::invalidate`]
/// or a forced refresh. A refresh replaces the lists as a whole, and only on
/// success.
#[derive(Debug, Default)]
pub struct CommandCatalog {
    commands: Option<Vec<String>>,
    args: HashMap<String, Vec<String>>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog that already knows its command list.
    #[cfg(test)]
    pub fn with_commands(commands: Vec<String>) -> Self {
        Self {
            commands: Some(commands),
            args: HashMap::new(),
        }
    }

    /// Returns the subcommands, asking `source` only when nothing is cached or
    /// `force` is set. A forced refresh also drops every cached flag list.
    pub fn list_commands(
        &mut self,
        source: &dyn HelpSource,
        force: bool,
    ) -> Result<&[String], DiscoveryError> {
        if force || self.commands.is_none() {
            let output = source.help(None)?;
            let parsed = parse_command_list(&output);
            log::debug!("Discovered {} management commands.", parsed.len());
            self.commands = Some(parsed);
            self.args.clear();
        }
        Ok(self.commands.as_deref().unwrap_or_default())
    }

    /// Returns the sorted flags accepted by `command`.
    pub fn list_command_args(
        &mut self,
        source: &dyn HelpSource,
        command: &str,
    ) -> Result<&[String], DiscoveryError> {
        if !self.args.contains_key(command) {
            let output = source.help(Some(command))?;
            self.args
                .insert(command.to_string(), parse_command_args(&output));
        }
        Ok(self.args.get(command).map(Vec::as_slice).unwrap_or_default())
    }

    /// The cached command list, if any, without triggering discovery.
    #[cfg(test)]
    pub fn cached_commands(&self) -> Option<&[String]> {
        self.commands.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.commands = None;
        self.args.clear();
    }
}

/// Extracts subcommand names from top-level help output.
///
/// Scanning starts after the optional `Usage:` line; names are collected from the
/// indented lines following `Available subcommands:`. Section headers such as
/// `[auth]` are skipped. Order is kept as emitted.
pub fn parse_command_list(output: &str) -> Vec<String> {
    let mut lines = output.lines().peekable();

    if output.lines().any(|l| l.trim_start().starts_with(USAGE_ANCHOR)) {
        for line in lines.by_ref() {
            if line.trim_start().starts_with(USAGE_ANCHOR) {
                break;
            }
        }
    }

    let mut found_anchor = false;
    for line in lines.by_ref() {
        if line.trim() == SUBCOMMANDS_ANCHOR {
            found_anchor = true;
            break;
        }
    }
    if !found_anchor {
        return Vec::new();
    }

    lines
        .filter_map(|line| COMMAND_LINE_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Extracts the sorted, deduplicated long flags listed after the options anchor
/// of a subcommand's help output.
pub fn parse_command_args(output: &str) -> Vec<String> {
    let Some(anchor_pos) = output
        .lines()
        .position(|line| OPTIONS_ANCHOR_RE.is_match(line))
    else {
        return Vec::new();
    };

    let mut flags: Vec<String> = output
        .lines()
        .skip(anchor_pos + 1)
        .flat_map(|line| FLAG_RE.find_iter(line).map(|m| m.as_str().to_string()))
        .collect();
    flags.sort();
    flags.dedup();
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const HELP_OUTPUT: &str = "\
Usage: manage.py subcommand [options] [args]

Type 'manage.py help <subcommand>' for help on a specific subcommand.

Available subcommands:

[auth]
    changepassword
    createsuperuser

[django]
    check
    dumpdata
    loaddata
    migrate

[staticfiles]
    collectstatic
    runserver
";

    const DUMPDATA_HELP: &str = "\
usage: manage.py dumpdata [-h] [--format FORMAT] [--indent INDENT]
                          [--database DATABASE] [app_label ...]

Output the contents of the database as a fixture.

positional arguments:
  app_label[.ModelName]
                        Restricts dumped data to the specified app_label.

options:
  -h, --help            show this help message and exit
  --format FORMAT       Specifies the output serialization format.
  --indent INDENT       Specifies the indent level to use.
  --database DATABASE   Nominates a specific database to dump fixtures from.
  --settings=SETTINGS   The Python path to a settings module.
  --format FORMAT       (repeated on purpose)
";

    struct CountingSource {
        calls: Cell<usize>,
        output: String,
    }

    impl CountingSource {
        fn new(output: &str) -> Self {
            Self {
                calls: Cell::new(0),
                output: output.to_string(),
            }
        }
    }

    impl HelpSource for CountingSource {
        fn help(&self, subcommand: Option<&str>) -> Result<String, DiscoveryError> {
            self.calls.set(self.calls.get() + 1);
            match subcommand {
                None => Ok(self.output.clone()),
                Some(_) => Ok(DUMPDATA_HELP.to_string()),
            }
        }
    }

    struct FailingSource;

    impl HelpSource for FailingSource {
        fn help(&self, _subcommand: Option<&str>) -> Result<String, DiscoveryError> {
            Err(DiscoveryError::Malformed {
                invocation: "python manage.py help".into(),
                reason: "boom".into(),
                output: String::new(),
            })
        }
    }

    #[test]
    fn test_parse_command_list_keeps_emitted_order() {
        let commands = parse_command_list(HELP_OUTPUT);
        assert_eq!(
            commands,
            vec![
                "changepassword",
                "createsuperuser",
                "check",
                "dumpdata",
                "loaddata",
                "migrate",
                "collectstatic",
                "runserver"
            ]
        );
    }

    #[test]
    fn test_parse_command_list_without_usage_line() {
        let output = "Type 'manage.py help <subcommand>'.\n\nAvailable subcommands:\n\n  shell\n  test\n";
        assert_eq!(parse_command_list(output), vec!["shell", "test"]);
    }

    #[test]
    fn test_parse_command_list_without_anchor_is_empty() {
        assert!(parse_command_list("Usage: manage.py\n    migrate\n").is_empty());
    }

    #[test]
    fn test_parse_command_args_sorted_after_options_anchor() {
        let flags = parse_command_args(DUMPDATA_HELP);
        assert_eq!(
            flags,
            vec!["--database", "--format", "--help", "--indent", "--settings="]
        );
    }

    #[test]
    fn test_parse_command_args_without_anchor_is_empty() {
        assert!(parse_command_args("usage: manage.py check [--deploy]\n").is_empty());
    }

    #[test]
    fn test_list_commands_is_cached_until_forced() {
        let source = CountingSource::new(HELP_OUTPUT);
        let mut catalog = CommandCatalog::new();

        let first = catalog.list_commands(&source, false).unwrap().to_vec();
        let second = catalog.list_commands(&source, false).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(source.calls.get(), 1);

        let forced_a = catalog.list_commands(&source, true).unwrap().to_vec();
        let forced_b = catalog.list_commands(&source, true).unwrap().to_vec();
        assert_eq!(forced_a, forced_b);
        assert_eq!(forced_a, first);
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn test_list_command_args_cached_and_cleared_by_refresh() {
        let source = CountingSource::new(HELP_OUTPUT);
        let mut catalog = CommandCatalog::new();

        catalog.list_command_args(&source, "dumpdata").unwrap();
        catalog.list_command_args(&source, "dumpdata").unwrap();
        assert_eq!(source.calls.get(), 1);

        catalog.list_commands(&source, true).unwrap();
        catalog.list_command_args(&source, "dumpdata").unwrap();
        assert_eq!(source.calls.get(), 3);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_list() {
        let mut catalog = CommandCatalog::with_commands(vec!["check".to_string()]);
        assert!(catalog.list_commands(&FailingSource, true).is_err());
        assert_eq!(catalog.cached_commands(), Some(&["check".to_string()][..]));
        // A cached value is served without calling the failing source.
        assert_eq!(catalog.list_commands(&FailingSource, false).unwrap(), ["check"]);
    }
}
