// src/core/environment.rs

use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("variable '{0}' is read-only")]
    ReadonlyVariable(String),
    #[error("no such alias '{0}'")]
    UnknownAlias(String),
}

/// A shell variable as modules left it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variable {
    /// `None` for names that were only exported or marked read-only.
    pub value: Option<String>,
    /// Literal values are rendered single-quoted so the shell never expands them.
    pub literal: bool,
    pub exported: bool,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub source: String,
    pub module: String,
}

/// One executed statement, replayed verbatim when the environment is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Assign {
        name: String,
        value: Option<String>,
        literal: bool,
        exported: bool,
        readonly: bool,
    },
    Unset(String),
    Alias { name: String, value: String },
    Unalias(String),
    Function(String),
    /// Code passed through untouched.
    Snippet(String),
}

/// The actions one module produced, kept at the position the module first ran.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModuleBlock {
    module: String,
    actions: Vec<Action>,
}

/// The shared state modules execute against: variables, aliases, functions and
/// pass-through snippets.
///
/// The maps answer lookups during loading. The block log remembers the order statements
/// ran in, which is the order the rendered script replays them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    variables: BTreeMap<String, Variable>,
    aliases: BTreeMap<String, String>,
    functions: BTreeMap<String, FunctionDef>,
    blocks: Vec<ModuleBlock>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Variables ---

    pub fn set_variable(
        &mut self,
        module: &str,
        name: &str,
        value: Option<String>,
        literal: bool,
        exported: bool,
        readonly: bool,
    ) -> Result<(), EnvError> {
        let var = self.variables.entry(name.to_string()).or_default();
        if value.is_some() && var.readonly {
            return Err(EnvError::ReadonlyVariable(name.to_string()));
        }
        if value.is_some() {
            var.value.clone_from(&value);
            var.literal = literal;
        }
        var.exported |= exported;
        var.readonly |= readonly;
        self.record(
            module,
            Action::Assign {
                name: name.to_string(),
                value,
                literal,
                exported,
                readonly,
            },
        );
        Ok(())
    }

    pub fn unset_variable(&mut self, module: &str, name: &str) -> Result<(), EnvError> {
        if self.variables.get(name).is_some_and(|v| v.readonly) {
            return Err(EnvError::ReadonlyVariable(name.to_string()));
        }
        self.variables.remove(name);
        self.record(module, Action::Unset(name.to_string()));
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(|v| v.value.as_deref())
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &Variable)> {
        self.variables.iter()
    }

    /// Expands `~`, `$VAR` and `${VAR}` against this environment, then the process
    /// environment. Unknown references are left for the shell.
    pub fn expand(&self, input: &str) -> String {
        let home = || dirs::home_dir().map(|p| p.to_string_lossy().into_owned());
        shellexpand::full_with_context_no_errors(input, home, |name: &str| {
            self.value_of(name)
                .map(str::to_string)
                .or_else(|| std::env::var(name).ok())
        })
        .into_owned()
    }

    // --- Aliases ---

    pub fn define_alias(&mut self, module: &str, name: &str, value: String) {
        self.aliases.insert(name.to_string(), value.clone());
        self.record(
            module,
            Action::Alias {
                name: name.to_string(),
                value,
            },
        );
    }

    pub fn remove_alias(&mut self, module: &str, name: &str) -> Result<(), EnvError> {
        if self.aliases.remove(name).is_none() {
            return Err(EnvError::UnknownAlias(name.to_string()));
        }
        self.record(module, Action::Unalias(name.to_string()));
        Ok(())
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&String, &String)> {
        self.aliases.iter()
    }

    // --- Functions ---

    pub fn define_function(&mut self, module: &str, name: &str, source: &str) {
        self.functions.insert(
            name.to_string(),
            FunctionDef {
                source: source.to_string(),
                module: module.to_string(),
            },
        );
        self.record(module, Action::Function(source.to_string()));
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = (&String, &FunctionDef)> {
        self.functions.iter()
    }

    // --- Snippets ---

    pub fn push_snippet(&mut self, module: &str, source: &str) {
        self.record(module, Action::Snippet(source.to_string()));
    }

    /// Pass-through snippets as `(module, source)`, in execution order.
    pub fn snippets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().flat_map(|block| {
            block.actions.iter().filter_map(move |action| match action {
                Action::Snippet(source) => Some((block.module.as_str(), source.as_str())),
                _ => None,
            })
        })
    }

    // --- Execution log ---

    /// Starts a (re)run of `module`: the actions of its previous run are dropped, and
    /// new ones land at the position the module first ran in.
    pub fn begin_module(&mut self, module: &str) {
        match self.blocks.iter_mut().find(|b| b.module == module) {
            Some(block) => block.actions.clear(),
            None => self.blocks.push(ModuleBlock {
                module: module.to_string(),
                actions: Vec::new(),
            }),
        }
    }

    /// The actions a module produced, in execution order.
    pub fn actions_of(&self, module: &str) -> &[Action] {
        self.blocks
            .iter()
            .find(|b| b.module == module)
            .map_or(&[], |b| b.actions.as_slice())
    }

    fn record(&mut self, module: &str, action: Action) {
        if let Some(block) = self.blocks.iter_mut().find(|b| b.module == module) {
            block.actions.push(action);
            return;
        }
        self.blocks.push(ModuleBlock {
            module: module.to_string(),
            actions: vec![action],
        });
    }

    /// True if `name` is a function, an alias, or a variable with a value.
    pub fn defines(&self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.aliases.contains_key(name)
            || self.value_of(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.aliases.is_empty()
            && self.functions.is_empty()
            && self.blocks.iter().all(|b| b.actions.is_empty())
    }

    // --- Rendering ---

    /// Renders the environment as POSIX shell source, suitable for `eval` or an rc file.
    /// Statements are replayed in the order modules executed them.
    pub fn to_shell_script(&self) -> String {
        let mut script = String::new();
        for block in self.blocks.iter().filter(|b| !b.actions.is_empty()) {
            let _ = writeln!(script, "# {}", block.module);
            for action in &block.actions {
                render_action(&mut script, action);
            }
        }
        script
    }
}

fn render_action(script: &mut String, action: &Action) {
    match action {
        Action::Assign {
            name,
            value,
            literal,
            exported,
            readonly,
        } => {
            match (value, exported) {
                (Some(value), true) => {
                    let _ = writeln!(script, "export {}={}", name, quote_value(value, *literal));
                }
                (Some(value), false) => {
                    let _ = writeln!(script, "{}={}", name, quote_value(value, *literal));
                }
                (None, true) => {
                    let _ = writeln!(script, "export {}", name);
                }
                (None, false) => {}
            }
            if *readonly {
                let _ = writeln!(script, "readonly {}", name);
            }
        }
        Action::Unset(name) => {
            let _ = writeln!(script, "unset {}", name);
        }
        Action::Alias { name, value } => {
            let _ = writeln!(script, "alias {}={}", name, single_quote(value));
        }
        Action::Unalias(name) => {
            let _ = writeln!(script, "unalias {}", name);
        }
        Action::Function(source) | Action::Snippet(source) => {
            let _ = writeln!(script, "{}", source);
        }
    }
}

fn quote_value(value: &str, literal: bool) -> String {
    if literal {
        single_quote(value)
    } else {
        double_quote(value)
    }
}

/// Wraps a value in single quotes for POSIX shells.
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Wraps a value in double quotes, leaving `$` references for the shell to expand.
pub fn double_quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('`', "\\`");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readonly_blocks_reassignment_and_unset() {
        let mut env = Environment::new();
        env.set_variable("m", "TOKEN", Some("a".into()), false, false, true)
            .unwrap();
        assert_eq!(
            env.set_variable("m", "TOKEN", Some("b".into()), false, false, false),
            Err(EnvError::ReadonlyVariable("TOKEN".into()))
        );
        assert!(env.unset_variable("m", "TOKEN").is_err());
        // Flag-only updates are still allowed.
        env.set_variable("m", "TOKEN", None, false, true, false).unwrap();
        assert!(env.variable("TOKEN").unwrap().exported);
        assert_eq!(env.value_of("TOKEN"), Some("a"));
    }

    #[test]
    fn test_remove_unknown_alias_fails() {
        let mut env = Environment::new();
        env.define_alias("m", "ll", "ls -la".into());
        assert!(env.remove_alias("m", "ll").is_ok());
        assert_eq!(
            env.remove_alias("m", "ll"),
            Err(EnvError::UnknownAlias("ll".into()))
        );
        assert_eq!(env.actions_of("m").len(), 2);
    }

    #[test]
    fn test_expand_uses_environment_variables_first() {
        let mut env = Environment::new();
        env.set_variable("m", "SHELLMODS_TEST_BASE", Some("/opt/tools".into()), false, false, false)
            .unwrap();
        assert_eq!(env.expand("${SHELLMODS_TEST_BASE}/bin"), "/opt/tools/bin");
        assert_eq!(env.expand("$SHELLMODS_TEST_BASE/lib"), "/opt/tools/lib");
    }

    #[test]
    fn test_begin_module_replaces_only_that_module_in_place() {
        let mut env = Environment::new();
        env.push_snippet("a", "setopt autocd");
        env.push_snippet("b", "bindkey -e");

        env.begin_module("a");
        env.push_snippet("a", "setopt extendedglob");

        let snippets: Vec<_> = env.snippets().collect();
        assert_eq!(
            snippets,
            [("a", "setopt extendedglob"), ("b", "bindkey -e")]
        );
    }

    #[test]
    fn test_render_script() {
        let mut env = Environment::new();
        env.set_variable("misc", "EDITOR", Some("nvim".into()), false, true, false)
            .unwrap();
        env.set_variable("misc", "PS_LIT", Some("it's $x".into()), true, false, false)
            .unwrap();
        env.define_alias("misc", "gs", "git status".into());
        env.define_function("misc", "greet", "greet() { echo hi; }");
        env.push_snippet("misc", "setopt autocd");

        let script = env.to_shell_script();
        assert!(script.starts_with("# misc\n"));
        assert!(script.contains("export EDITOR=\"nvim\"\n"));
        assert!(script.contains("PS_LIT='it'\\''s $x'\n"));
        assert!(script.contains("alias gs='git status'\n"));
        assert!(script.contains("greet() { echo hi; }\n"));
        assert!(script.ends_with("setopt autocd\n"));
    }

    #[test]
    fn test_render_keeps_execution_order() {
        let mut env = Environment::new();
        env.push_snippet("brew", "if true; then export BREW_PREFIX=/opt/brew; fi");
        env.set_variable("brew", "BREW_PATH", Some("$BREW_PREFIX/bin".into()), false, true, false)
            .unwrap();
        env.set_variable("path", "A", Some("1".into()), false, false, true)
            .unwrap();
        env.unset_variable("path", "UNUSED").unwrap();

        let script = env.to_shell_script();
        let snippet = script.find("if true").unwrap();
        let assign = script.find("export BREW_PATH").unwrap();
        assert!(snippet < assign);
        assert!(script.ends_with("# path\nA=\"1\"\nreadonly A\nunset UNUSED\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_rendered_script_evaluates_in_order() {
        let mut env = Environment::new();
        env.push_snippet("brew", "if true; then SHELLMODS_TEST_PREFIX=/opt/brew; fi");
        env.set_variable(
            "brew",
            "SHELLMODS_TEST_PATH",
            Some("$SHELLMODS_TEST_PREFIX/bin".into()),
            false,
            true,
            false,
        )
        .unwrap();

        let script = format!(
            "{}printf %s \"$SHELLMODS_TEST_PATH\"",
            env.to_shell_script()
        );
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&script)
            .env_remove("SHELLMODS_TEST_PREFIX")
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "/opt/brew/bin");
    }
}
