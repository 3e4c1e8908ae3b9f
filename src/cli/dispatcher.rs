// src/cli/dispatcher.rs

use anyhow::{Result, anyhow};
use clap::CommandFactory;

use crate::{
    cli::{Cli, handlers},
    core::settings::Settings,
};

/// Defines a command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(Vec<String>, &Settings) -> Result<()>,
}

/// The single source of truth for all commands.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "load",
        aliases: &[],
        handler: handlers::load::handle,
    },
    CommandDefinition {
        name: "reload",
        aliases: &["rl"],
        handler: handlers::reload::handle,
    },
    CommandDefinition {
        name: "list",
        aliases: &["ls"],
        handler: handlers::list::handle,
    },
    CommandDefinition {
        name: "toggle",
        aliases: &[],
        handler: handlers::toggle::handle,
    },
    CommandDefinition {
        name: "edit",
        aliases: &[],
        handler: handlers::edit::handle,
    },
    CommandDefinition {
        name: "check",
        aliases: &["doctor"],
        handler: handlers::check::handle,
    },
    CommandDefinition {
        name: "status",
        aliases: &["st"],
        handler: handlers::status::handle,
    },
    CommandDefinition {
        name: "shell",
        aliases: &["start"],
        handler: handlers::shell::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Routes `shellmods <command> [args...]` to its handler.
pub fn dispatch(all_args: Vec<String>) -> Result<()> {
    log::debug!("Dispatching args: {:?}", all_args);

    let Some((name, rest)) = all_args.split_first() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let command = find_command(name)
        .ok_or_else(|| anyhow!(t!("cli.error.unknown_command"), name = name))?;
    let settings = Settings::load()?;
    log::debug!("Resolved settings: {:?}", settings);

    (command.handler)(rest.to_vec(), &settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_command_by_name_and_alias() {
        assert_eq!(find_command("reload").map(|c| c.name), Some("reload"));
        assert_eq!(find_command("rl").map(|c| c.name), Some("reload"));
        assert_eq!(find_command("doctor").map(|c| c.name), Some("check"));
        assert!(find_command("install").is_none());
    }

    #[test]
    fn test_command_names_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for cmd in COMMAND_REGISTRY {
            assert!(seen.insert(cmd.name), "duplicate command {}", cmd.name);
            for alias in cmd.aliases {
                assert!(seen.insert(*alias), "duplicate alias {}", alias);
            }
        }
    }
}
