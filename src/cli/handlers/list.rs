// src/cli/handlers/list.rs

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use crate::{
    cli::handlers::commons::{self, pad},
    core::{health, registry::Registry, settings::Settings},
};

/// Widest description shown before it is cut.
const DESCRIPTION_WIDTH: usize = 50;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists modules in load order.")]
struct ListArgs {
    /// Print the modules as JSON.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args)?;
    let mut registry = Registry::new(&settings.modules_dir, settings.disabled.clone());
    let modules = registry.discover()?;

    if list_args.json {
        return commons::print_json(&modules);
    }

    if modules.is_empty() {
        println!(
            "\n{}",
            format!(
                t!("list.info.no_modules"),
                dir = settings.modules_dir.display()
            )
        );
        return Ok(());
    }

    let name_width = modules
        .iter()
        .map(|m| m.name().chars().count())
        .max()
        .unwrap_or(0)
        .max(t!("list.header.module").len());

    println!(
        "\n{}  {}  {}  {}  {}",
        pad(t!("list.header.module"), name_width).bold(),
        pad(t!("list.header.priority"), 8).bold(),
        pad(t!("list.header.state"), 8).bold(),
        pad(t!("list.header.version"), 8).bold(),
        t!("list.header.description").bold()
    );

    for module in modules {
        let state = if module.enabled {
            t!("list.state.enabled").green()
        } else {
            t!("list.state.disabled").dimmed()
        };
        println!(
            "{}  {}  {}  {}  {}",
            pad(&module.name().cyan().to_string(), name_width),
            pad(&module.priority().to_string(), 8),
            pad(&state.to_string(), 8),
            pad(module.manifest.version.as_deref().unwrap_or("-"), 8),
            health::truncate(
                module.manifest.description.as_deref().unwrap_or(""),
                DESCRIPTION_WIDTH
            )
            .dimmed()
        );
    }

    println!(
        "\n{}",
        format!(
            t!("list.info.count"),
            total = modules.len(),
            disabled = modules.iter().filter(|m| !m.enabled).count()
        )
        .dimmed()
    );
    Ok(())
}
