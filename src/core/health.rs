// src/core/health.rs

//! Read-only diagnostics over module files.
//!
//! Unlike the loader, which only asks "does this parse?", a health check also looks for
//! the marks a hand-edited file tends to carry: block keywords that no longer pair up,
//! `eval`, and files with nothing left in them. Nothing here executes module code.

use crate::{
    constants::ISSUE_SUMMARY_WIDTH,
    core::{manifest, parser},
    models::{HealthReport, Module, ModuleHealth},
};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

lazy_static! {
    static ref VERSION_VAR_RE: Regex =
        Regex::new(r#"^\s*(?:export\s+|readonly\s+)?[A-Z_]*VERSION=["']?([^"'\s;]+)"#)
            .expect("valid version regex");
}

/// Opening and closing markers compared by raw count.
const BLOCK_PAIRS: [(&str, &str); 4] = [("if", "fi"), ("case", "esac"), ("do", "done"), ("{", "}")];

/// Checks one module on disk.
pub fn check(module: &Module) -> ModuleHealth {
    match fs::read_to_string(&module.path) {
        Ok(source) => check_source(module.name(), &module.path, &source),
        Err(e) => ModuleHealth {
            name: module.name().to_string(),
            path: module.path.clone(),
            pass: false,
            issues: vec![format!("cannot read file: {}", e)],
            version: module.manifest.version.clone(),
        },
    }
}

/// Checks module text that is already in memory.
pub fn check_source(name: &str, path: &Path, source: &str) -> ModuleHealth {
    let mut issues = Vec::new();

    if let Err(e) = parser::validate(source) {
        issues.push(format!("parse error at {}", e));
    }

    let counts = keyword_counts(source);
    for (open, close) in BLOCK_PAIRS {
        let opened = counts.get(open);
        let closed = counts.get(close);
        if opened != closed {
            issues.push(format!(
                "unbalanced '{}'/'{}' markers ({} vs {})",
                open, close, opened, closed
            ));
        }
    }

    if let Some(line) = counts.first_eval {
        issues.push(format!("uses 'eval' at line {} (dynamic code evaluation)", line));
    }

    if is_effectively_empty(source) {
        issues.push("module is empty".to_string());
    }

    ModuleHealth {
        name: name.to_string(),
        path: path.to_path_buf(),
        pass: issues.is_empty(),
        issues,
        version: declared_version(source),
    }
}

/// Checks every module, enabled or not.
pub fn check_all(modules: &[Module]) -> HealthReport {
    HealthReport {
        modules: modules.iter().map(check).collect(),
    }
}

/// The first issue of a failing module, cut to fit the report's issue column.
pub fn first_issue_summary(health: &ModuleHealth) -> Option<String> {
    health.issues.first().map(|issue| truncate(issue, ISSUE_SUMMARY_WIDTH))
}

/// Shortens `text` to at most `width` characters, ending in an ellipsis when cut.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Header version first, then a `*VERSION=` assignment.
fn declared_version(source: &str) -> Option<String> {
    manifest::parse_header(source).version.or_else(|| {
        source
            .lines()
            .find_map(|line| VERSION_VAR_RE.captures(line))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn is_effectively_empty(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

// --- Keyword Scan ---

#[derive(Debug, Default)]
struct KeywordCounts {
    counts: Vec<(&'static str, usize)>,
    first_eval: Option<usize>,
}

impl KeywordCounts {
    fn get(&self, keyword: &str) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| *k == keyword)
            .map_or(0, |(_, n)| *n)
    }

    fn bump(&mut self, keyword: &'static str) {
        match self.counts.iter_mut().find(|(k, _)| *k == keyword) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((keyword, 1)),
        }
    }
}

/// Counts block keywords as whole words outside quotes and comments.
fn keyword_counts(source: &str) -> KeywordCounts {
    let mut counts = KeywordCounts::default();
    let tracked: Vec<&'static str> = BLOCK_PAIRS.iter().flat_map(|(o, c)| [*o, *c]).collect();

    for (index, line) in source.lines().enumerate() {
        for word in words(&strip_quotes_and_comment(line)) {
            if word == "eval" && counts.first_eval.is_none() {
                counts.first_eval = Some(index + 1);
            }
            if let Some(keyword) = tracked.iter().find(|k| **k == word) {
                counts.bump(*keyword);
            }
        }
    }
    counts
}

fn words(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || matches!(c, ';' | '&' | '|' | '(' | ')'))
        .filter(|w| !w.is_empty())
}

/// Blanks out quoted text and drops a trailing comment.
fn strip_quotes_and_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = ' ';

    for c in line.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && q == '"' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                    out.push(' ');
                }
            }
            None => {
                if escaped {
                    escaped = false;
                    out.push('_');
                } else if c == '\\' {
                    escaped = true;
                } else if c == '\'' || c == '"' {
                    quote = Some(c);
                } else if c == '#' && prev.is_whitespace() {
                    break;
                } else {
                    out.push(c);
                }
            }
        }
        prev = c;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleManifest;
    use tempfile::tempdir;

    fn health(source: &str) -> ModuleHealth {
        check_source("m", Path::new("m.sh"), source)
    }

    #[test]
    fn test_clean_module_passes() {
        let h = health("# version: 2.1\nif [ -d ~/bin ]; then\n  export PATH=\"$HOME/bin:$PATH\"\nfi\ngs() { git status; }\n");
        assert!(h.pass, "{:?}", h.issues);
        assert_eq!(h.version.as_deref(), Some("2.1"));
    }

    #[test]
    fn test_unbalanced_markers_are_reported() {
        let h = health("if true; then\n  echo hi\n");
        assert!(!h.pass);
        assert!(h.issues.iter().any(|i| i.starts_with("parse error at line")));
        assert!(h.issues.iter().any(|i| i == "unbalanced 'if'/'fi' markers (1 vs 0)"));
    }

    #[test]
    fn test_keywords_in_quotes_and_comments_are_ignored() {
        let h = health("echo 'if you want' \"done\" # fi fi\n");
        assert!(h.pass, "{:?}", h.issues);
    }

    #[test]
    fn test_eval_is_a_risk() {
        let h = health("export A=1\neval \"$(dircolors)\"\n");
        assert!(!h.pass);
        assert_eq!(h.issues, vec!["uses 'eval' at line 2 (dynamic code evaluation)"]);
    }

    #[test]
    fn test_empty_module() {
        let h = health("#!/bin/sh\n# nothing yet\n\n");
        assert_eq!(h.issues, vec!["module is empty"]);
    }

    #[test]
    fn test_version_from_variable() {
        let h = health("export PLUGIN_VERSION=\"0.3.1\"\n");
        assert_eq!(h.version.as_deref(), Some("0.3.1"));
    }

    #[test]
    fn test_truncate_to_width() {
        let long = "x".repeat(60);
        let cut = truncate(&long, ISSUE_SUMMARY_WIDTH);
        assert_eq!(cut.chars().count(), ISSUE_SUMMARY_WIDTH);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", ISSUE_SUMMARY_WIDTH), "short");
    }

    #[test]
    fn test_check_all_includes_disabled_modules() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("10-good.sh");
        let bad = dir.path().join("20-bad.sh");
        fs::write(&good, "alias ll='ls -l'\n").unwrap();
        fs::write(&bad, "for f in *; do\n  echo \"$f\"\n").unwrap();

        let module = |name: &str, path: &Path, enabled| Module {
            manifest: ModuleManifest {
                name: name.into(),
                priority: 10,
                version: None,
                description: None,
            },
            path: path.to_path_buf(),
            enabled,
            last_load_status: None,
        };
        let report = check_all(&[module("good", &good, true), module("bad", &bad, false)]);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);

        let summary = first_issue_summary(&report.modules[1]).unwrap();
        assert!(summary.chars().count() <= ISSUE_SUMMARY_WIDTH);
    }
}
