// src/cli/handlers/shell.rs

use anyhow::Result;
use clap::Parser;

use crate::{
    cli::handlers::commons,
    core::settings::Settings,
    system::shell,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Loads all modules and starts an interactive shell with the result."
)]
struct ShellArgs {
    /// The shell to launch (a key of `[shells]` in config.toml). Defaults to `shell`
    /// from config.toml, then the basename of `$SHELL`.
    shell: Option<String>,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let shell_args = ShellArgs::try_parse_from(&args)?;
    let shell_name = shell_args.shell.as_deref().unwrap_or(&settings.shell);

    let mut orchestrator = commons::build_orchestrator(settings, false);
    orchestrator.run_all()?;

    let cwd = std::env::current_dir()?;
    shell::launch_session(
        orchestrator.environment(),
        shell_name,
        &settings.shells,
        &cwd,
        &orchestrator.registry().disabled().to_list(),
    )?;
    Ok(())
}
