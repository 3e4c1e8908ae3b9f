// src/core/unit.rs

//! The `ExecutableUnit` seam between the loader and module bodies.
//!
//! A unit can be validated statically and executed against an explicit [`Environment`].
//! [`ScriptUnit`] is the file-backed implementation; tests substitute their own units.

use crate::{
    constants::MAX_SOURCE_DEPTH,
    core::{
        environment::{EnvError, Environment},
        parser::{self, Statement, StatementKind, ValidationError, Value},
    },
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// A runtime failure while executing a module body.
#[derive(Error, Debug)]
#[error("line {line}: {kind}")]
pub struct ExecutionError {
    pub line: usize,
    pub kind: ExecutionErrorKind,
}

#[derive(Error, Debug)]
pub enum ExecutionErrorKind {
    #[error(transparent)]
    Environment(#[from] EnvError),
    #[error("'{0}' is required but no earlier module defines it")]
    MissingRequirement(String),
    #[error("cannot source '{path}': {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("sourced file '{path}' is invalid: {source}")]
    SourceInvalid {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },
    #[error("in sourced file '{path}': {source}")]
    Sourced {
        path: PathBuf,
        #[source]
        source: Box<ExecutionError>,
    },
    #[error("'source' nested deeper than {0} levels")]
    SourceDepth(usize),
    #[error("module body is invalid: {0}")]
    Invalid(ValidationError),
}

/// Something the loader can validate and then execute.
pub trait ExecutableUnit {
    fn name(&self) -> &str;

    /// Static check. Must not touch any environment.
    fn validate(&self) -> Result<(), ValidationError>;

    fn execute(&self, env: &mut Environment) -> Result<(), ExecutionError>;
}

/// A module body read from disk.
#[derive(Debug, Clone)]
pub struct ScriptUnit {
    name: String,
    source: String,
    base_dir: PathBuf,
}

impl ScriptUnit {
    /// `base_dir` is where relative `source` paths are resolved.
    pub fn new(name: impl Into<String>, source: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn from_file(name: impl Into<String>, path: &Path) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(name, source, base_dir))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl ExecutableUnit for ScriptUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<(), ValidationError> {
        parser::validate(&self.source)
    }

    fn execute(&self, env: &mut Environment) -> Result<(), ExecutionError> {
        let statements = parser::parse(&self.source).map_err(|e| ExecutionError {
            line: e.line,
            kind: ExecutionErrorKind::Invalid(e),
        })?;
        let interpreter = Interpreter {
            module: &self.name,
            base_dir: &self.base_dir,
        };
        interpreter.run(&statements, env, 0)
    }
}

// --- Interpreter ---

struct Interpreter<'a> {
    module: &'a str,
    base_dir: &'a Path,
}

impl Interpreter<'_> {
    fn run(&self, statements: &[Statement], env: &mut Environment, depth: usize) -> Result<(), ExecutionError> {
        for statement in statements {
            self.apply(&statement.kind, env, depth)
                .map_err(|kind| ExecutionError {
                    line: statement.line,
                    kind,
                })?;
        }
        Ok(())
    }

    fn apply(&self, kind: &StatementKind, env: &mut Environment, depth: usize) -> Result<(), ExecutionErrorKind> {
        match kind {
            StatementKind::Assign {
                name,
                value,
                exported,
                readonly,
            } => {
                let (value, literal) = match value {
                    Some(v) => (Some(resolve(v, env)), !v.expand),
                    None => (None, false),
                };
                env.set_variable(self.module, name, value, literal, *exported, *readonly)?;
            }
            StatementKind::Unset(names) => {
                for name in names {
                    env.unset_variable(self.module, name)?;
                }
            }
            StatementKind::Alias { name, value } => {
                let value = resolve(value, env);
                env.define_alias(self.module, name, value);
            }
            StatementKind::Unalias(names) => {
                for name in names {
                    env.remove_alias(self.module, name)?;
                }
            }
            StatementKind::Function { name, source } => env.define_function(self.module, name, source),
            StatementKind::Require(names) => {
                if let Some(missing) = names.iter().find(|n| !env.defines(n)) {
                    return Err(ExecutionErrorKind::MissingRequirement(missing.clone()));
                }
            }
            StatementKind::Source(path) => self.source_file(path, env, depth)?,
            StatementKind::Snippet(source) => env.push_snippet(self.module, source),
        }
        Ok(())
    }

    fn source_file(&self, raw_path: &str, env: &mut Environment, depth: usize) -> Result<(), ExecutionErrorKind> {
        if depth >= MAX_SOURCE_DEPTH {
            return Err(ExecutionErrorKind::SourceDepth(MAX_SOURCE_DEPTH));
        }
        let expanded = PathBuf::from(env.expand(raw_path));
        let path = if expanded.is_absolute() {
            expanded
        } else {
            self.base_dir.join(expanded)
        };
        log::debug!("Module '{}' sources '{}'", self.module, path.display());

        let content = fs::read_to_string(&path).map_err(|source| ExecutionErrorKind::SourceRead {
            path: path.clone(),
            source,
        })?;
        let statements = parser::parse(&content).map_err(|source| ExecutionErrorKind::SourceInvalid {
            path: path.clone(),
            source,
        })?;

        let nested = Interpreter {
            module: self.module,
            base_dir: path.parent().unwrap_or(self.base_dir),
        };
        nested
            .run(&statements, env, depth + 1)
            .map_err(|e| ExecutionErrorKind::Sourced {
                path: path.clone(),
                source: Box::new(e),
            })
    }
}

fn resolve(value: &Value, env: &Environment) -> String {
    if value.expand {
        env.expand(&value.text)
    } else {
        value.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn run(source: &str) -> Result<Environment, ExecutionError> {
        let unit = ScriptUnit::new("test", source, ".");
        let mut env = Environment::new();
        unit.execute(&mut env)?;
        Ok(env)
    }

    #[test]
    fn test_execute_defines_state() {
        let env = run("export BASE=/opt\nTOOLS=$BASE/tools\nalias t='cd $BASE'\nt2() { :; }\nsetopt autocd\n").unwrap();
        assert_eq!(env.value_of("TOOLS"), Some("/opt/tools"));
        assert!(env.variable("BASE").unwrap().exported);
        assert_eq!(env.alias("t"), Some("cd $BASE"));
        assert!(env.function("t2").is_some());
        assert_eq!(env.snippets().count(), 1);
    }

    #[test]
    fn test_require_reports_missing_name_and_line() {
        let err = run("export A=1\nrequire A git_root\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(
            err.kind,
            ExecutionErrorKind::MissingRequirement(ref n) if n == "git_root"
        ));
    }

    #[test]
    fn test_readonly_reassignment_is_a_runtime_error() {
        let err = run("readonly A=1\nA=2\n").unwrap_err();
        assert!(matches!(err.kind, ExecutionErrorKind::Environment(_)));
    }

    #[test]
    fn test_source_relative_to_module_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("extra.sh"), "export FROM_EXTRA=yes\n").unwrap();
        let module = dir.path().join("10-main.sh");
        fs::write(&module, "source extra.sh\n").unwrap();

        let unit = ScriptUnit::from_file("main", &module).unwrap();
        let mut env = Environment::new();
        unit.execute(&mut env).unwrap();
        assert_eq!(env.value_of("FROM_EXTRA"), Some("yes"));
    }

    #[test]
    fn test_source_missing_file_and_loops() {
        let err = run("source /definitely/not/here.sh\n").unwrap_err();
        assert!(matches!(err.kind, ExecutionErrorKind::SourceRead { .. }));

        let dir = tempdir().unwrap();
        let looping = dir.path().join("loop.sh");
        fs::write(&looping, "source loop.sh\n").unwrap();
        let unit = ScriptUnit::from_file("loop", &looping).unwrap();
        let err = unit.execute(&mut Environment::new()).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));
    }
}
