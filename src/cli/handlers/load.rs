// src/cli/handlers/load.rs

//! # Handler for the `load` command
//!
//! Loads every module (or a single named one) and reports the session.
//!
//! The intended use from an rc file is:
//!
//! ```sh
//! eval "$(shellmods load --emit)"
//! ```
//!
//! With `--emit` the rendered environment is the only thing written to stdout; progress,
//! failures and the benchmark table go to stderr.

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons,
    core::settings::Settings,
    models::LoadSession,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Loads modules in priority order and reports what happened."
)]
struct LoadArgs {
    /// Load only this module, on top of an empty environment.
    name: Option<String>,

    /// Print the resulting environment as shell code on stdout.
    #[arg(long, conflicts_with = "json")]
    emit: bool,

    /// Time each module and print the slowest first.
    #[arg(long)]
    bench: bool,

    /// Print the load session as JSON on stdout.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let load_args = LoadArgs::try_parse_from(&args)?;
    let mut orchestrator = commons::build_orchestrator(settings, load_args.bench);

    let session = match &load_args.name {
        Some(name) => LoadSession::from_outcomes(vec![orchestrator.load_one(name)?]),
        None => orchestrator.run_all()?,
    };

    if load_args.bench || settings.benchmark {
        commons::print_timing_report(&session);
    }
    if load_args.json {
        commons::print_json(&session)?;
    }
    if load_args.emit {
        print!("{}", orchestrator.environment().to_shell_script());
    }
    Ok(())
}
