// src/system/shell.rs

use crate::{core::environment::Environment, models::ShellConfig};
use colored::Colorize;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::TempDir;
use thiserror::Error;

/// Marks a shell started by `shellmods shell`, so modules can detect nesting.
pub const SESSION_MARKER_VAR: &str = "SHELLMODS_SESSION";

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Requested shell '{0}' is not defined in config.toml and was not found in PATH.")]
    ShellNotDefined(String),
    #[error("Could not start shell '{shell}': {source}")]
    Spawn {
        shell: String,
        #[source]
        source: std::io::Error,
    },
}

/// Launches an interactive shell whose startup file is the rendered environment.
///
/// Shells with `interactive_args` (bash: `--rcfile`) get the init script path
/// appended to those arguments. Other shells are started with `-i` and find the
/// script through `ZDOTDIR/.zshrc` (zsh) or `$ENV` (POSIX sh).
pub fn launch_session(
    env: &Environment,
    shell_name: &str,
    shells: &HashMap<String, ShellConfig>,
    cwd: &Path,
    disabled_list: &str,
) -> Result<(), ShellError> {
    let shell_config = shells
        .get(shell_name)
        .ok_or_else(|| ShellError::ShellNotDefined(shell_name.to_string()))?;

    // Dropped (and deleted) when the session ends.
    let session_dir = tempfile::Builder::new().prefix("shellmods-").tempdir()?;
    let script_path = write_init_files(&session_dir, env)?;
    log::debug!("Init script created at: {}", script_path.display());

    eprintln!(
        "\n--- {} '{}' {}. ---",
        "shellmods session in".green(),
        shell_name.yellow().bold(),
        "started".green()
    );

    let mut cmd = Command::new(&shell_config.path);
    cmd.current_dir(dunce::simplified(cwd))
        .env(SESSION_MARKER_VAR, "1")
        .env(crate::constants::ENV_DISABLED, disabled_list);

    match &shell_config.interactive_args {
        Some(args) => {
            cmd.args(args).arg(&script_path);
        }
        None => {
            cmd.env("ZDOTDIR", session_dir.path())
                .env("ENV", &script_path)
                .arg("-i");
        }
    }

    let status = cmd.status().map_err(|source| ShellError::Spawn {
        shell: shell_name.to_string(),
        source,
    })?;
    if !status.success() {
        log::warn!("Interactive shell exited with code: {:?}", status.code());
    }
    Ok(())
}

fn write_init_files(session_dir: &TempDir, env: &Environment) -> Result<PathBuf, ShellError> {
    let script_path = session_dir.path().join("init.sh");
    fs::write(&script_path, build_init_script(env))?;

    let zshrc = format!(". {}\n", crate::core::environment::single_quote(&script_path.to_string_lossy()));
    fs::write(session_dir.path().join(".zshrc"), zshrc)?;
    Ok(script_path)
}

/// Builds the session's startup script: the rendered environment plus a short banner.
pub fn build_init_script(env: &Environment) -> String {
    let mut script = String::from("# Generated by shellmods for an interactive session.\n");
    script.push_str(&env.to_shell_script());

    let exit_message = "--- Type 'exit' to leave. ---";
    script.push_str(&format!("\necho ''\necho '{}'\necho ''\n", exit_message));
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_script_contains_environment() {
        let mut env = Environment::new();
        env.set_variable("editor", "EDITOR", Some("nvim".into()), false, true, false)
            .unwrap();
        env.define_alias("git", "gs", "git status".into());

        let script = build_init_script(&env);
        assert!(script.starts_with("# Generated by shellmods"));
        assert!(script.contains("export EDITOR=\"nvim\"\n"));
        assert!(script.contains("alias gs='git status'\n"));
        assert!(script.contains("Type 'exit' to leave."));
    }

    #[test]
    fn test_unknown_shell_is_rejected() {
        let err = launch_session(
            &Environment::new(),
            "fish",
            &HashMap::new(),
            Path::new("."),
            "",
        )
        .unwrap_err();
        assert!(matches!(err, ShellError::ShellNotDefined(name) if name == "fish"));
    }

    #[test]
    fn test_init_files_written_for_zsh() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_init_files(&dir, &Environment::new()).unwrap();
        assert!(script.is_file());
        let zshrc = fs::read_to_string(dir.path().join(".zshrc")).unwrap();
        assert!(zshrc.contains("init.sh"));
    }
}
