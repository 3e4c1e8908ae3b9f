// src/system/executor.rs

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, Command as StdCommand, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a running child is polled while waiting for it.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Command could not be parsed: {0}")]
    CommandParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{0}' exited with a non-zero error code.")]
    NonZeroExitStatus(String),
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Command '{command}' did not finish within {} ms", .timeout.as_millis())]
    TimedOut { command: String, timeout: Duration },
    #[error("Command '{0}' was interrupted.")]
    Interrupted(String),
}

/// Runs an interactive command (such as an editor) with inherited stdio and waits for it.
///
/// `command_line` is split with shell quoting rules, so `code --wait` works;
/// `extra_args` are appended verbatim.
pub fn execute_command(command_line: &str, extra_args: &[&str], cwd: &Path) -> Result<(), ProcessError> {
    let trimmed_command = command_line.trim();
    let parts = shlex::split(trimmed_command)
        .ok_or_else(|| ProcessError::CommandParse(trimmed_command.to_string()))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(ProcessError::EmptyCommand);
    };
    let clean_cwd = dunce::simplified(cwd);

    let mut command = StdCommand::new(program);
    command
        .args(args)
        .args(extra_args)
        .current_dir(clean_cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    // Built-ins like `notepad` aliases only resolve through cmd on Windows.
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == ErrorKind::NotFound && cfg!(target_os = "windows") => {
            log::debug!("Command '{}' not found. Retrying with cmd /C.", program);
            StdCommand::new("cmd")
                .arg("/C")
                .arg(trimmed_command)
                .args(extra_args)
                .current_dir(clean_cwd)
                .spawn()
                .map_err(|e| ProcessError::CommandFailed(trimmed_command.to_string(), e))?
        }
        Err(e) => return Err(ProcessError::CommandFailed(trimmed_command.to_string(), e)),
    };

    let status = child
        .wait()
        .map_err(|e| ProcessError::CommandFailed(trimmed_command.to_string(), e))?;
    check_status(trimmed_command, status)
}

/// Runs a non-interactive command and returns its trimmed stdout.
///
/// Stderr is discarded. The child is killed if it outlives `timeout`.
pub fn capture_output(
    program: &str,
    args: &[&str],
    cwd: &Path,
    env_vars: &[(&str, &str)],
    timeout: Duration,
) -> Result<String, ProcessError> {
    let display = display_command(program, args);
    let mut child = StdCommand::new(program)
        .args(args)
        .current_dir(dunce::simplified(cwd))
        .envs(env_vars.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ProcessError::CommandFailed(display.clone(), e))?;

    // Drain stdout on the side so a chatty child cannot block on a full pipe.
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let status = wait_with_deadline(&mut child, &display, timeout)?;

    let bytes = match reader {
        Some(handle) => match handle.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(ProcessError::CommandFailed(display, e)),
            Err(_) => Vec::new(),
        },
        None => Vec::new(),
    };

    check_status(&display, status)?;
    let output = String::from_utf8(bytes).map_err(|e| ProcessError::InvalidUtf8Output {
        command: display,
        source: e,
    })?;
    Ok(output.trim().to_string())
}

/// Non-blocking wait loop, killing the child once the deadline passes.
fn wait_with_deadline(child: &mut Child, display: &str, timeout: Duration) -> Result<ExitStatus, ProcessError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::debug!(
                        "Timeout reached, killing child process (PID: {})...",
                        child.id()
                    );
                    if let Err(e) = child.kill() {
                        log::warn!("Failed to kill child process {}: {}", child.id(), e);
                    }
                    child.wait().ok();
                    return Err(ProcessError::TimedOut {
                        command: display.to_string(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(ProcessError::CommandFailed(display.to_string(), e)),
        }
    }
}

fn check_status(command: &str, status: ExitStatus) -> Result<(), ProcessError> {
    if status.success() {
        return Ok(());
    }
    // No exit code means the child died from a signal; 130 is the shell's Ctrl+C code.
    match status.code() {
        None | Some(130) => Err(ProcessError::Interrupted(command.to_string())),
        Some(_) => Err(ProcessError::NonZeroExitStatus(command.to_string())),
    }
}

fn display_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_capture_output_trims() {
        let out = capture_output("echo", &["  hello  "], Path::new("."), &[], Duration::from_secs(5)).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_capture_output_passes_env() {
        let out = capture_output(
            "sh",
            &["-c", "printf %s \"$SHELLMODS_PROBE\""],
            Path::new("."),
            &[("SHELLMODS_PROBE", "42")],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out, "42");
    }

    #[test]
    fn test_capture_output_times_out() {
        let err = capture_output("sleep", &["5"], Path::new("."), &[], Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[test]
    fn test_capture_output_non_zero_exit() {
        let err = capture_output("false", &[], Path::new("."), &[], Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ProcessError::NonZeroExitStatus(_)));
    }

    #[test]
    fn test_execute_command_rejects_empty() {
        assert!(matches!(
            execute_command("   ", &[], Path::new(".")),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[test]
    fn test_execute_command_appends_args() {
        execute_command("sh -c 'test \"$0\" = ok'", &["ok"], Path::new(".")).unwrap();
        assert!(execute_command("sh -c 'exit 3'", &[], Path::new(".")).is_err());
    }
}
