// src/core/orchestrator.rs

//! # Load Orchestrator
//!
//! Top-level sequencing over the [`Registry`] and [`Loader`]: the initial load, reload,
//! single-module loads, and the edit-then-reload flow.
//!
//! Progress goes to stderr so that stdout stays free for the rendered environment
//! (`shellmods load --emit`).

use crate::{
    core::{
        environment::Environment,
        loader::Loader,
        parser::{self, ValidationError},
        registry::{Registry, RegistryError},
    },
    models::{LoadSession, LoadStatus, ModuleOutcome},
    system::executor::{self, ProcessError},
};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Module '{0}' was not found.")]
    UnknownModule(String),
    #[error("Could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not restore backup of '{path}': {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Editor failed: {0}")]
    Editor(#[from] ProcessError),
}

/// The three ways out of an edit that no longer validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditChoice {
    ReEdit,
    RestoreAndAbort,
    KeepDespiteErrors,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// The editor closed without changing the file.
    Unchanged,
    /// The edit validated and modules were reloaded.
    Reloaded(LoadSession),
    /// The edit failed validation and the backup was written back.
    Restored,
    /// The edit failed validation, the user kept it, and modules were reloaded anyway.
    KeptWithErrors(LoadSession),
}

/// Opens a module file for editing and returns once the user is done.
pub trait ModuleEditor {
    fn open(&mut self, path: &Path) -> Result<(), ProcessError>;
}

/// Asks the user what to do with an edit that failed validation.
pub trait EditPrompt {
    fn on_invalid(&mut self, module: &str, error: &ValidationError) -> EditChoice;
}

/// Runs the configured editor command.
#[derive(Debug, Clone)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ModuleEditor for SystemEditor {
    fn open(&mut self, path: &Path) -> Result<(), ProcessError> {
        let cwd = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let target = path.to_string_lossy();
        executor::execute_command(&self.command, &[&*target], cwd)
    }
}

#[derive(Debug)]
pub struct Orchestrator {
    registry: Registry,
    loader: Loader,
    env: Environment,
    verbose: bool,
}

impl Orchestrator {
    pub fn new(registry: Registry, loader: Loader, verbose: bool) -> Self {
        Self {
            registry,
            loader,
            env: Environment::new(),
            verbose,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Discovers modules and loads every one of them in order.
    ///
    /// Module failures are recorded in the session and never stop the pass. The only
    /// error is an unusable modules directory.
    pub fn run_all(&mut self) -> Result<LoadSession, RegistryError> {
        let modules = self.registry.discover()?.to_vec();
        let mut outcomes = Vec::with_capacity(modules.len());

        for module in &modules {
            let outcome = self.loader.load(module, &mut self.env);
            self.registry.record_status(module.name(), outcome.status);
            self.report(&outcome);
            outcomes.push(outcome);
        }

        let session = LoadSession::from_outcomes(outcomes);
        self.print_summary(&session);
        Ok(session)
    }

    /// Starts over from an empty environment with verbose progress. The previous
    /// verbosity is restored however the pass ends.
    pub fn reload(&mut self) -> Result<LoadSession, RegistryError> {
        let previous = self.verbose;
        self.verbose = true;
        let mut this = scopeguard::guard(self, move |o| o.verbose = previous);

        this.loader.reset();
        this.env = Environment::new();
        eprintln!("{}", t!("reload.info.starting").dimmed());

        let session = this.run_all()?;
        if session.failed() > 0 {
            eprintln!(
                "{} {}",
                t!("common.warning").yellow().bold(),
                format!(t!("reload.warning.failures"), count = session.failed())
            );
        }
        Ok(session)
    }

    /// Loads a single module by name on top of the current environment. An unknown
    /// name is reported as a missing module.
    pub fn load_one(&mut self, name: &str) -> Result<ModuleOutcome, RegistryError> {
        self.registry.discover()?;
        let Some(module) = self.registry.find(name).cloned() else {
            log::warn!("Module '{}' not found in '{}'", name, self.registry.dir().display());
            let outcome = ModuleOutcome::failed(name, format!("module '{}' not found", name));
            self.report(&outcome);
            return Ok(outcome);
        };

        let outcome = self.loader.load(&module, &mut self.env);
        self.registry.record_status(name, outcome.status);
        self.report(&outcome);
        Ok(outcome)
    }

    /// Opens a module in an editor, validates the result and reloads.
    ///
    /// The file's bytes are kept in memory for the whole flow; choosing
    /// [`EditChoice::RestoreAndAbort`] writes them back unchanged.
    pub fn edit(
        &mut self,
        name: &str,
        editor: &mut dyn ModuleEditor,
        prompt: &mut dyn EditPrompt,
    ) -> Result<EditOutcome, EditError> {
        self.registry.discover()?;
        let path = self
            .registry
            .find(name)
            .map(|m| m.path.clone())
            .ok_or_else(|| EditError::UnknownModule(name.to_string()))?;

        let backup = read_bytes(&path)?;
        let backup_fingerprint = fingerprint(&backup);
        log::debug!("Backed up '{}' ({})", path.display(), backup_fingerprint);

        loop {
            editor.open(&path)?;
            let edited = read_bytes(&path)?;
            if fingerprint(&edited) == backup_fingerprint {
                eprintln!("{}", format!(t!("edit.info.unchanged"), name = name).dimmed());
                return Ok(EditOutcome::Unchanged);
            }

            let text = String::from_utf8_lossy(&edited);
            let error = match parser::validate(&text) {
                Ok(()) => {
                    drop(backup);
                    eprintln!(
                        "{} {}",
                        t!("common.success").green().bold(),
                        format!(t!("edit.success.valid"), name = name)
                    );
                    return Ok(EditOutcome::Reloaded(self.reload()?));
                }
                Err(e) => e,
            };

            match prompt.on_invalid(name, &error) {
                EditChoice::ReEdit => continue,
                EditChoice::RestoreAndAbort => {
                    fs::write(&path, &backup).map_err(|source| EditError::Restore {
                        path: path.clone(),
                        source,
                    })?;
                    eprintln!("{}", format!(t!("edit.info.restored"), name = name).yellow());
                    return Ok(EditOutcome::Restored);
                }
                EditChoice::KeepDespiteErrors => {
                    log::warn!("Keeping invalid edit of '{}': {}", name, error);
                    return Ok(EditOutcome::KeptWithErrors(self.reload()?));
                }
            }
        }
    }

    fn report(&self, outcome: &ModuleOutcome) {
        match (&outcome.error, self.verbose) {
            (Some(error), _) => eprintln!("  {} {}: {}", "✗".red(), outcome.name.bold(), error),
            (None, true) => {
                let mark = match outcome.status {
                    LoadStatus::Skipped => "-".dimmed(),
                    _ => "✓".green(),
                };
                eprintln!("  {} {}", mark, outcome.name);
            }
            (None, false) => {}
        }
    }

    fn print_summary(&self, session: &LoadSession) {
        let summary = format!(
            t!("load.info.summary"),
            succeeded = session.succeeded(),
            failed = session.failed(),
            skipped = session.skipped()
        );
        if session.failed() > 0 {
            eprintln!("{}", summary.yellow());
        } else {
            eprintln!("{}", summary.green());
        }
    }
}

/// Hex-encoded blake3 digest of a file's content.
fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, EditError> {
    fs::read(path).map_err(|source| EditError::Read {
        path: path.to_path_buf(),
        source,
    })
}
