// src/bin/shellmods.rs

use clap::Parser;
use colored::*;
use shellmods::{
    cli::{Cli, dispatcher},
    core::orchestrator::EditError,
    system::executor::ProcessError,
};

/// The main entry point of `shellmods`.
/// Sets up logging, parses arguments, dispatches, and handles errors in one place.
fn main() {
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("CLI args parsed: {:?}", cli);

    if let Err(e) = dispatcher::dispatch(cli.args) {
        // --- Centralized Error Handling ---
        // Per-command `--help` and usage errors come back as clap errors; let clap print them.
        if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
            clap_err.exit();
        }

        if is_interrupted(&e) {
            std::process::exit(130);
        }

        eprintln!("\n{}: {}", shellmods::t!("common.error").red().bold(), e);
        std::process::exit(1);
    }
}

/// True when the user interrupted the editor with Ctrl+C.
fn is_interrupted(e: &anyhow::Error) -> bool {
    let process_err = e.downcast_ref::<ProcessError>().or_else(|| {
        e.downcast_ref::<EditError>().and_then(|edit_err| match edit_err {
            EditError::Editor(p) => Some(p),
            _ => None,
        })
    });
    matches!(process_err, Some(ProcessError::Interrupted(_)))
}
