// src/system/shells_config.rs

use std::{collections::HashMap, env, path::PathBuf};

use crate::models::ShellConfig;

/// Shells found in `PATH`, overlaid with the `[shells.*]` tables from `config.toml`.
pub fn resolve_shells(configured: &HashMap<String, ShellConfig>) -> HashMap<String, ShellConfig> {
    let mut shells = generate_default_shells_config();
    shells.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
    shells
}

fn generate_default_shells_config() -> HashMap<String, ShellConfig> {
    let mut shells = HashMap::new();
    if is_executable_in_path("bash") {
        shells.insert(
            "bash".to_string(),
            ShellConfig {
                path: PathBuf::from("bash"),
                interactive_args: Some(vec!["--rcfile".to_string()]),
            },
        );
    }
    for name in ["zsh", "sh"] {
        if is_executable_in_path(name) {
            shells.insert(
                name.to_string(),
                ShellConfig {
                    path: PathBuf::from(name),
                    interactive_args: None,
                },
            );
        }
    }
    shells
}

pub fn is_executable_in_path(executable_name: &str) -> bool {
    if let Ok(path_var) = env::var("PATH") {
        for path in env::split_paths(&path_var) {
            if path.join(executable_name).is_file() {
                return true;
            }
        }
    }
    false
}

/// The basename of `$SHELL`, falling back to `bash`.
pub fn get_default_shell_name() -> String {
    env::var("SHELL")
        .ok()
        .and_then(|s| {
            PathBuf::from(s)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "bash".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_shells_override_defaults() {
        let mut configured = HashMap::new();
        configured.insert(
            "bash".to_string(),
            ShellConfig {
                path: PathBuf::from("/opt/bash5/bin/bash"),
                interactive_args: Some(vec!["--noprofile".into(), "--rcfile".into()]),
            },
        );
        let shells = resolve_shells(&configured);
        assert_eq!(shells["bash"].path, PathBuf::from("/opt/bash5/bin/bash"));
    }

    #[test]
    fn test_default_shell_name_is_never_empty() {
        assert!(!get_default_shell_name().is_empty());
    }
}
