// src/cli/dispatcher.rs

use crate::cli::{console::Console, handlers};
use anyhow::Result;

/// A console command, its aliases and its handler.
pub(crate) struct CommandDefinition {
    pub(crate) name: &'static str,
    pub(crate) aliases: &'static [&'static str],
    pub(crate) summary: &'static str,
    handler: fn(Vec<String>, &mut Console) -> Result<()>,
}

/// Every console command.
pub(crate) static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "commands",
        aliases: &["ls"],
        summary: t!("console.summary.commands"),
        handler: handlers::catalog::handle_commands,
    },
    CommandDefinition {
        name: "args",
        aliases: &[],
        summary: t!("console.summary.args"),
        handler: handlers::catalog::handle_args,
    },
    CommandDefinition {
        name: "reload",
        aliases: &[],
        summary: t!("console.summary.reload"),
        handler: handlers::catalog::handle_reload,
    },
    CommandDefinition {
        name: "run",
        aliases: &["r"],
        summary: t!("console.summary.run"),
        handler: handlers::run::handle_run,
    },
    CommandDefinition {
        name: "q",
        aliases: &["quick"],
        summary: t!("console.summary.quick"),
        handler: handlers::run::handle_quick,
    },
    CommandDefinition {
        name: "sessions",
        aliases: &["ps"],
        summary: t!("console.summary.sessions"),
        handler: handlers::sessions::handle_sessions,
    },
    CommandDefinition {
        name: "show",
        aliases: &[],
        summary: t!("console.summary.show"),
        handler: handlers::sessions::handle_show,
    },
    CommandDefinition {
        name: "next",
        aliases: &["n"],
        summary: t!("console.summary.next"),
        handler: handlers::sessions::handle_next,
    },
    CommandDefinition {
        name: "prev",
        aliases: &["p"],
        summary: t!("console.summary.prev"),
        handler: handlers::sessions::handle_prev,
    },
    CommandDefinition {
        name: "wait",
        aliases: &["w"],
        summary: t!("console.summary.wait"),
        handler: handlers::sessions::handle_wait,
    },
    CommandDefinition {
        name: "send",
        aliases: &[],
        summary: t!("console.summary.send"),
        handler: handlers::sessions::handle_send,
    },
    CommandDefinition {
        name: "kill",
        aliases: &["k"],
        summary: t!("console.summary.kill"),
        handler: handlers::sessions::handle_kill,
    },
    CommandDefinition {
        name: "kill-all",
        aliases: &["ka"],
        summary: t!("console.summary.kill_all"),
        handler: handlers::sessions::handle_kill_all,
    },
    CommandDefinition {
        name: "setting",
        aliases: &["set"],
        summary: t!("console.summary.setting"),
        handler: handlers::metadata::handle_setting,
    },
    CommandDefinition {
        name: "app-path",
        aliases: &[],
        summary: t!("console.summary.app_path"),
        handler: handlers::metadata::handle_app_path,
    },
    CommandDefinition {
        name: "grep",
        aliases: &["search"],
        summary: t!("console.summary.grep"),
        handler: handlers::search::handle,
    },
    CommandDefinition {
        name: "help",
        aliases: &["?"],
        summary: t!("console.summary.help"),
        handler: handlers::general::handle_help,
    },
    CommandDefinition {
        name: "quit",
        aliases: &["exit"],
        summary: t!("console.summary.quit"),
        handler: handlers::general::handle_quit,
    },
];

/// Finds a command by name or alias.
pub(crate) fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Runs the handler registered under `name`. Returns `Ok(false)` when there is none.
pub(crate) fn dispatch(name: &str, args: Vec<String>, console: &mut Console) -> Result<bool> {
    let Some(command) = find_command(name) else {
        return Ok(false);
    };
    log::debug!("Console command '{}' with args {:?}", command.name, args);
    (command.handler)(args, console)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_find_command_by_name_and_alias() {
        assert_eq!(find_command("kill-all").map(|c| c.name), Some("kill-all"));
        assert_eq!(find_command("quick").map(|c| c.name), Some("q"));
        assert_eq!(find_command("exit").map(|c| c.name), Some("quit"));
        assert!(find_command("migrate").is_none());
    }

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = HashSet::new();
        for cmd in COMMAND_REGISTRY {
            assert!(seen.insert(cmd.name), "duplicate '{}'", cmd.name);
            for alias in cmd.aliases {
                assert!(seen.insert(*alias), "duplicate '{}'", alias);
            }
        }
    }
}
