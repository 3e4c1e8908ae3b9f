// src/cli/handlers/toggle.rs

//! # Handler for the `toggle` command
//!
//! Flips a module between enabled and disabled.
//!
//! The disabled set lives in `SHELLMODS_DISABLED`, which a child process cannot change
//! for its parent shell. The handler therefore prints the updated assignment on stdout:
//!
//! ```sh
//! eval "$(shellmods toggle prompt)"
//! ```

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    constants::ENV_DISABLED,
    core::{environment::single_quote, registry::Registry, settings::Settings},
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Enables a disabled module or disables an enabled one."
)]
struct ToggleArgs {
    /// The module name. It does not need to exist yet.
    name: String,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let toggle_args = ToggleArgs::try_parse_from(&args)?;
    let name = toggle_args.name.trim();

    let mut registry = Registry::new(&settings.modules_dir, settings.disabled.clone());
    registry.discover()?;
    let known = registry.find(name).is_some();
    let enabled = registry.toggle(name);

    let message = if enabled {
        format!(t!("toggle.success.enabled"), name = name.cyan())
    } else {
        format!(t!("toggle.success.disabled"), name = name.cyan())
    };
    eprintln!("{} {}", t!("common.success").green().bold(), message);
    if !known {
        eprintln!("{}", format!(t!("toggle.warning.unknown"), name = name).yellow());
    }

    println!(
        "export {}={}",
        ENV_DISABLED,
        single_quote(&registry.disabled().to_list())
    );
    Ok(())
}
