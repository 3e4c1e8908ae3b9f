// src/core/registry.rs

use crate::{
    core::{manifest, paths},
    models::{LoadStatus, Module},
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Path(#[from] paths::PathError),
    #[error("Could not scan modules directory '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// The set of disabled module names, round-tripped through a comma-delimited list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisabledSet {
    names: BTreeSet<String>,
}

impl DisabledSet {
    pub fn parse(list: &str) -> Self {
        let names = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Disables an enabled name or re-enables a disabled one. Returns whether the
    /// name is enabled afterwards.
    pub fn toggle(&mut self, name: &str) -> bool {
        if self.names.remove(name) {
            true
        } else {
            self.names.insert(name.to_string());
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    pub fn to_list(&self) -> String {
        self.names.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

/// Scans `dir` (non-recursively) and returns its modules in load order:
/// priority ascending, then name.
pub fn discover_modules(dir: &Path, disabled: &DisabledSet) -> Result<Vec<Module>, RegistryError> {
    let mut modules = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|source| RegistryError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            log::warn!("Skipping module with a non UTF-8 name: {}", entry.path().display());
            continue;
        };
        let Some(parts) = manifest::parse_file_name(file_name) else {
            log::debug!("Ignoring non-module file '{}'", file_name);
            continue;
        };

        let content = fs::read_to_string(entry.path()).unwrap_or_else(|e| {
            log::warn!("Could not read '{}' for metadata: {}", entry.path().display(), e);
            String::new()
        });
        let manifest = manifest::build_manifest(parts, &content);
        let enabled = !disabled.contains(&manifest.name);
        modules.push(Module {
            manifest,
            path: entry.path().to_path_buf(),
            enabled,
            last_load_status: None,
        });
    }

    modules.sort_by(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.name().cmp(b.name()))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut seen = HashSet::new();
    modules.retain(|m| {
        let first = seen.insert(m.name().to_string());
        if !first {
            log::warn!(
                "Duplicate module name '{}' at '{}' ignored",
                m.name(),
                m.path.display()
            );
        }
        first
    });

    Ok(modules)
}

/// Owns the module directory, the disabled set and the latest discovery snapshot.
#[derive(Debug)]
pub struct Registry {
    dir: PathBuf,
    disabled: DisabledSet,
    modules: Vec<Module>,
}

impl Registry {
    pub fn new(dir: impl Into<PathBuf>, disabled: DisabledSet) -> Self {
        Self {
            dir: dir.into(),
            disabled,
            modules: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rescans the directory, creating it if needed. Load statuses from the previous
    /// snapshot carry over for modules that still exist.
    pub fn discover(&mut self) -> Result<&[Module], RegistryError> {
        paths::ensure_dir(&self.dir)?;
        let previous: HashMap<String, LoadStatus> = self
            .modules
            .iter()
            .filter_map(|m| m.last_load_status.map(|s| (m.name().to_string(), s)))
            .collect();

        let mut modules = discover_modules(&self.dir, &self.disabled)?;
        for module in &mut modules {
            module.last_load_status = previous.get(module.name()).copied();
        }
        log::debug!("Discovered {} modules in '{}'", modules.len(), self.dir.display());
        self.modules = modules;
        Ok(&self.modules)
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn find(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name() == name)
    }

    /// Flips a module between enabled and disabled. Names with no module on disk are
    /// accepted and apply once a matching module appears.
    pub fn toggle(&mut self, name: &str) -> bool {
        let enabled = self.disabled.toggle(name);
        if let Some(module) = self.modules.iter_mut().find(|m| m.name() == name) {
            module.enabled = enabled;
        } else {
            log::debug!("Toggled '{}', which has no module on disk yet", name);
        }
        enabled
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    pub fn disabled(&self) -> &DisabledSet {
        &self.disabled
    }

    pub fn record_status(&mut self, name: &str, status: LoadStatus) {
        if let Some(module) = self.modules.iter_mut().find(|m| m.name() == name) {
            module.last_load_status = Some(status);
        }
    }
}
