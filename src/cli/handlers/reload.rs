// src/cli/handlers/reload.rs

use anyhow::Result;
use clap::Parser;

use crate::{cli::handlers::commons, core::settings::Settings};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Reloads every module from scratch with live progress."
)]
struct ReloadArgs {
    /// Print the resulting environment as shell code on stdout.
    #[arg(long)]
    emit: bool,

    /// Time each module and print the slowest first.
    #[arg(long)]
    bench: bool,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let reload_args = ReloadArgs::try_parse_from(&args)?;
    let mut orchestrator = commons::build_orchestrator(settings, reload_args.bench);

    let session = orchestrator.reload()?;

    if reload_args.bench || settings.benchmark {
        commons::print_timing_report(&session);
    }
    if reload_args.emit {
        print!("{}", orchestrator.environment().to_shell_script());
    }
    Ok(())
}
