// src/core/loader.rs

use crate::{
    core::{
        environment::Environment,
        unit::{ExecutableUnit, ScriptUnit},
    },
    models::{Module, ModuleOutcome},
};
use std::io;
use std::time::Instant;

/// Loads one module at a time into an [`Environment`].
///
/// A module runs against a scratch copy of the environment. The copy replaces the
/// real one only when the module finishes cleanly, so a failing module leaves no
/// partial state behind.
#[derive(Debug, Default)]
pub struct Loader {
    benchmark: bool,
    loaded: Vec<String>,
}

impl Loader {
    pub fn new(benchmark: bool) -> Self {
        Self {
            benchmark,
            loaded: Vec::new(),
        }
    }

    pub fn benchmark(&self) -> bool {
        self.benchmark
    }

    pub fn set_benchmark(&mut self, benchmark: bool) {
        self.benchmark = benchmark;
    }

    /// Names of the modules loaded successfully since the last [`Loader::reset`], in load order.
    pub fn loaded(&self) -> &[String] {
        &self.loaded
    }

    pub fn reset(&mut self) {
        self.loaded.clear();
    }

    pub fn load(&mut self, module: &Module, env: &mut Environment) -> ModuleOutcome {
        if !module.enabled {
            log::debug!("Skipping disabled module '{}'", module.name());
            return ModuleOutcome::skipped(module.name());
        }

        let started = Instant::now();
        let unit = match ScriptUnit::from_file(module.name(), &module.path) {
            Ok(unit) => unit,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "Module '{}' not found at '{}'",
                    module.name(),
                    module.path.display()
                );
                return ModuleOutcome::failed(
                    module.name(),
                    format!("module file not found: {}", module.path.display()),
                );
            }
            Err(e) => {
                log::warn!("Could not read module '{}': {}", module.name(), e);
                return ModuleOutcome::failed(module.name(), format!("cannot read module file: {}", e));
            }
        };

        let mut outcome = self.run_unit(&unit, env);
        if self.benchmark {
            outcome.duration = Some(started.elapsed());
        }
        outcome
    }

    /// Loads an already-built unit. `enabled = false` yields `skipped` without touching it.
    pub fn load_unit(&mut self, unit: &dyn ExecutableUnit, enabled: bool, env: &mut Environment) -> ModuleOutcome {
        if !enabled {
            return ModuleOutcome::skipped(unit.name());
        }
        let started = Instant::now();
        let mut outcome = self.run_unit(unit, env);
        if self.benchmark {
            outcome.duration = Some(started.elapsed());
        }
        outcome
    }

    fn run_unit(&mut self, unit: &dyn ExecutableUnit, env: &mut Environment) -> ModuleOutcome {
        let name = unit.name();

        if let Err(e) = unit.validate() {
            log::warn!("Module '{}' failed validation: {}", name, e);
            return ModuleOutcome::failed(name, format!("syntax error at {}", e));
        }

        let mut scratch = env.clone();
        scratch.begin_module(name);
        match unit.execute(&mut scratch) {
            Ok(()) => {
                *env = scratch;
                if !self.loaded.iter().any(|n| n == name) {
                    self.loaded.push(name.to_string());
                }
                log::debug!("Loaded module '{}'", name);
                ModuleOutcome::success(name)
            }
            Err(e) => {
                log::warn!("Module '{}' failed at runtime: {}", name, e);
                ModuleOutcome::failed(name, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::ValidationError;
    use crate::core::unit::ExecutionError;
    use crate::models::{LoadStatus, ModuleManifest};
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn module_at(path: &Path, name: &str, enabled: bool) -> Module {
        Module {
            manifest: ModuleManifest {
                name: name.to_string(),
                priority: 10,
                version: None,
                description: None,
            },
            path: path.to_path_buf(),
            enabled,
            last_load_status: None,
        }
    }

    /// A unit that counts executions, for checking that invalid bodies never run.
    struct CountingUnit {
        valid: bool,
        runs: Cell<usize>,
    }

    impl ExecutableUnit for CountingUnit {
        fn name(&self) -> &str {
            "counting"
        }

        fn validate(&self) -> Result<(), ValidationError> {
            if self.valid {
                Ok(())
            } else {
                Err(ValidationError {
                    line: 3,
                    reason: "unterminated 'if' block".into(),
                })
            }
        }

        fn execute(&self, _env: &mut Environment) -> Result<(), ExecutionError> {
            self.runs.set(self.runs.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_disabled_module_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("10-a.sh");
        fs::write(&path, "export A=1\n").unwrap();

        let mut env = Environment::new();
        let outcome = Loader::new(false).load(&module_at(&path, "a", false), &mut env);
        assert_eq!(outcome.status, LoadStatus::Skipped);
        assert!(env.is_empty());
    }

    #[test]
    fn test_invalid_body_never_executes() {
        let unit = CountingUnit {
            valid: false,
            runs: Cell::new(0),
        };
        let mut loader = Loader::new(false);
        let outcome = loader.load_unit(&unit, true, &mut Environment::new());
        assert_eq!(outcome.status, LoadStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("syntax error at line 3: unterminated 'if' block"));
        assert_eq!(unit.runs.get(), 0);
        assert!(loader.loaded().is_empty());
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempdir().unwrap();
        let module = module_at(&dir.path().join("10-gone.sh"), "gone", true);
        let outcome = Loader::new(false).load(&module, &mut Environment::new());
        assert_eq!(outcome.status, LoadStatus::Failed);
        assert!(outcome.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_runtime_failure_leaves_environment_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("20-b.sh");
        fs::write(&path, "export PARTIAL=1\nalias ll='ls -l'\nrequire nothing_defines_this\n").unwrap();

        let mut env = Environment::new();
        env.set_variable("shell", "KEEP", Some("yes".into()), false, true, false).unwrap();
        let before = env.clone();

        let outcome = Loader::new(false).load(&module_at(&path, "b", true), &mut env);
        assert_eq!(outcome.status, LoadStatus::Failed);
        assert!(outcome.error.unwrap().starts_with("line 3:"));
        assert_eq!(env, before);
    }

    #[test]
    fn test_reloading_does_not_duplicate_snippets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("30-opts.zsh");
        fs::write(&path, "setopt autocd\n").unwrap();
        let module = module_at(&path, "opts", true);

        let mut env = Environment::new();
        let mut loader = Loader::new(false);
        loader.load(&module, &mut env);
        loader.load(&module, &mut env);
        assert_eq!(env.snippets().count(), 1);
        assert_eq!(loader.loaded(), ["opts"]);

        loader.reset();
        assert!(loader.loaded().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_emitted_script_replays_statements_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("10-brew.sh");
        fs::write(
            &path,
            "if true; then export SHELLMODS_TEST_BREW=/opt/brew; fi\nexport SHELLMODS_TEST_BREW_BIN=\"$SHELLMODS_TEST_BREW/bin\"\n",
        )
        .unwrap();

        let mut env = Environment::new();
        let outcome = Loader::new(false).load(&module_at(&path, "brew", true), &mut env);
        assert_eq!(outcome.status, LoadStatus::Success);

        let script = format!("{}printf %s \"$SHELLMODS_TEST_BREW_BIN\"", env.to_shell_script());
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .env_remove("SHELLMODS_TEST_BREW")
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "/opt/brew/bin");
    }

    #[test]
    fn test_benchmark_records_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("10-a.sh");
        fs::write(&path, "export A=1\n").unwrap();
        let module = module_at(&path, "a", true);

        let mut env = Environment::new();
        assert!(Loader::new(false).load(&module, &mut env).duration.is_none());
        assert!(Loader::new(true).load(&module, &mut env).duration.is_some());
    }
}
