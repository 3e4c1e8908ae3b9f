// src/core/settings.rs

//! Resolves runtime settings from `config.toml` and the environment.
//!
//! Precedence, highest first: `SHELLMODS_*` environment variables, `config.toml`,
//! built-in defaults.

use crate::{
    constants::{ENV_BENCHMARK, ENV_DISABLED, ENV_MODULES_DIR, ENV_VERBOSE},
    core::{
        paths::{self, PathError},
        registry::DisabledSet,
    },
    models::{CacheSettings, SettingsFile, ShellConfig},
    system::shells_config,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse '{path}': {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub modules_dir: PathBuf,
    pub disabled: DisabledSet,
    pub verbose: bool,
    pub benchmark: bool,
    pub editor: String,
    pub shell: String,
    pub cache: CacheSettings,
    pub shells: HashMap<String, ShellConfig>,
}

impl Settings {
    /// Reads `config.toml` from the config directory (if present) and applies the
    /// process environment on top.
    pub fn load() -> Result<Self, SettingsError> {
        let file = read_settings_file(&paths::get_settings_path()?)?;
        let default_modules_dir = paths::get_default_modules_dir()?;
        Ok(Self::resolve(file, &default_modules_dir, |key| {
            std::env::var(key).ok()
        }))
    }

    /// Merges a parsed settings file with environment values supplied by `lookup`.
    pub fn resolve(
        file: SettingsFile,
        default_modules_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let modules_dir = lookup(ENV_MODULES_DIR)
            .filter(|v| !v.trim().is_empty())
            .or(file.modules_dir)
            .map(|template| paths::expand_dir(&template))
            .unwrap_or_else(|| default_modules_dir.to_path_buf());

        let disabled = DisabledSet::parse(&lookup(ENV_DISABLED).unwrap_or_default());

        let verbose = env_flag(&lookup, ENV_VERBOSE)
            .or(file.verbose)
            .unwrap_or(false);
        let benchmark = env_flag(&lookup, ENV_BENCHMARK)
            .or(file.benchmark)
            .unwrap_or(false);

        let editor = file
            .editor
            .or_else(|| lookup("VISUAL"))
            .or_else(|| lookup("EDITOR"))
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());

        let shell = file.shell.unwrap_or_else(|| {
            lookup("SHELL")
                .and_then(|s| {
                    Path::new(&s)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| "bash".to_string())
        });

        Self {
            modules_dir,
            disabled,
            verbose,
            benchmark,
            editor,
            shell,
            shells: shells_config::resolve_shells(&file.shells),
            cache: file.cache,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.query_timeout_ms)
    }

    pub fn failure_ttl(&self) -> Option<Duration> {
        self.cache.failure_ttl_secs.map(Duration::from_secs)
    }
}

fn read_settings_file(path: &Path) -> Result<SettingsFile, SettingsError> {
    if !path.exists() {
        log::debug!("No settings file at '{}', using defaults", path.display());
        return Ok(SettingsFile::default());
    }
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&content).map_err(|source| SettingsError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_settings(content: &str) -> Result<SettingsFile, toml::de::Error> {
    toml::from_str(content)
}

/// `1`, `true`, `yes` and `on` are true; `0`, `false`, `no`, `off` and empty are false.
fn env_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        other => {
            log::warn!("Ignoring {}='{}': expected a boolean", key, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QueryKind;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(SettingsFile::default(), Path::new("/cfg/modules"), env(&[]));
        assert_eq!(settings.modules_dir, PathBuf::from("/cfg/modules"));
        assert!(!settings.verbose);
        assert!(!settings.benchmark);
        assert_eq!(settings.editor, "vi");
        assert_eq!(settings.shell, "bash");
        assert!(settings.disabled.is_empty());
        assert_eq!(settings.query_timeout(), Duration::from_millis(500));
        assert_eq!(settings.failure_ttl(), None);
    }

    #[test]
    fn test_file_values() {
        let file = parse_settings(
            r#"
modules_dir = "/srv/mods"
verbose = true
editor = "nvim"
shell = "zsh"

[cache]
query_timeout_ms = 250
failure_ttl_secs = 1

[cache.ttl]
branch = 10
"#,
        )
        .unwrap();
        let settings = Settings::resolve(file, Path::new("/cfg/modules"), env(&[("EDITOR", "nano")]));
        assert_eq!(settings.modules_dir, PathBuf::from("/srv/mods"));
        assert!(settings.verbose);
        assert_eq!(settings.editor, "nvim");
        assert_eq!(settings.shell, "zsh");
        assert_eq!(settings.query_timeout(), Duration::from_millis(250));
        assert_eq!(settings.failure_ttl(), Some(Duration::from_secs(1)));
        assert_eq!(settings.cache.ttl.ttl_for(QueryKind::Branch), Duration::from_secs(10));
        // Unset kinds keep their defaults.
        assert_eq!(settings.cache.ttl.ttl_for(QueryKind::Dirty), Duration::from_secs(2));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = parse_settings("modules_dir = \"/srv/mods\"\nverbose = true\n").unwrap();
        let settings = Settings::resolve(
            file,
            Path::new("/cfg/modules"),
            env(&[
                (ENV_MODULES_DIR, "/tmp/other"),
                (ENV_VERBOSE, "off"),
                (ENV_BENCHMARK, "Yes"),
                (ENV_DISABLED, "prompt, git"),
                ("VISUAL", "code --wait"),
                ("SHELL", "/usr/bin/zsh"),
            ]),
        );
        assert_eq!(settings.modules_dir, PathBuf::from("/tmp/other"));
        assert!(!settings.verbose);
        assert!(settings.benchmark);
        assert!(settings.disabled.contains("git"));
        assert_eq!(settings.editor, "code --wait");
        assert_eq!(settings.shell, "zsh");
    }

    #[test]
    fn test_unrecognized_flag_falls_through() {
        let file = parse_settings("benchmark = true\n").unwrap();
        let settings = Settings::resolve(file, Path::new("/m"), env(&[(ENV_BENCHMARK, "maybe")]));
        assert!(settings.benchmark);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        assert!(parse_settings("verbose = \"very\"\n").is_err());
    }
}
