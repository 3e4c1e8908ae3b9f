// src/core/paths.rs

use crate::constants::{CONFIG_DIR_NAME, MODULES_DIR_NAME, SETTINGS_FILENAME};
use lazy_static::lazy_static;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref SHELLMODS_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not create config directory at '{path}': {source}")]
    ConfigDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not create modules directory at '{path}': {source}")]
    ModulesDirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the shellmods configuration directory (`~/.config/shellmods`),
/// creating it if it doesn't exist.
///
/// Memoized: only the first call touches the filesystem.
pub fn get_config_dir() -> Result<PathBuf, PathError> {
    // A poisoned lock only means another thread panicked mid-lookup; the cached value is still usable.
    let mut cached = SHELLMODS_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    if !config_path.exists() {
        fs::create_dir_all(&config_path).map_err(|e| PathError::ConfigDirCreation {
            path: config_path.display().to_string(),
            source: e,
        })?;
    }

    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// Path of `config.toml` inside the configuration directory.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(SETTINGS_FILENAME))
}

/// The default modules directory, used when neither the environment nor
/// `config.toml` names one.
pub fn get_default_modules_dir() -> Result<PathBuf, PathError> {
    get_config_dir().map(|dir| dir.join(MODULES_DIR_NAME))
}

/// Expands `~` and `$VAR` in a user-supplied directory. An unknown variable leaves
/// everything but the tilde unexpanded.
pub fn expand_dir(template: &str) -> PathBuf {
    match shellexpand::full(template) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            log::warn!("Could not expand '{}': {}", template, e);
            PathBuf::from(shellexpand::tilde(template).into_owned())
        }
    }
}

/// Creates `dir` and its parents when missing.
pub fn ensure_dir(dir: &Path) -> Result<(), PathError> {
    if dir.is_dir() {
        return Ok(());
    }
    log::debug!("Creating modules directory '{}'", dir.display());
    fs::create_dir_all(dir).map_err(|e| PathError::ModulesDirCreation {
        path: dir.display().to_string(),
        source: e,
    })
}
