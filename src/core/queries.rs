// src/core/queries.rs

//! Adapters that answer status-line questions by asking git.
//!
//! Every adapter is read-only: commands run with `GIT_OPTIONAL_LOCKS=0` so a prompt
//! redraw never competes with the user's own git commands for the index lock, and each
//! command is bounded by a timeout.

use crate::{
    core::cache::{Clock, QueryCache},
    models::QueryKind,
    system::executor::{self, ProcessError},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("'{0}' is not inside a git repository")]
    NotARepository(PathBuf),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("unexpected output from '{command}': '{output}'")]
    UnexpectedOutput { command: String, output: String },
}

/// Answers one kind of question about a directory.
pub trait QueryAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError>;
}

/// Shared plumbing for the git-backed adapters.
#[derive(Debug, Clone, Copy)]
pub struct Git {
    timeout: Duration,
}

impl Git {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run(&self, context: &Path, args: &[&str]) -> Result<String, QueryError> {
        if !context.is_dir() {
            return Err(QueryError::NotARepository(context.to_path_buf()));
        }
        executor::capture_output(
            "git",
            args,
            context,
            &[("GIT_OPTIONAL_LOCKS", "0"), ("LC_ALL", "C")],
            self.timeout,
        )
        .map_err(QueryError::from)
    }
}

/// Current branch; the short commit hash when `HEAD` is detached.
#[derive(Debug)]
pub struct BranchAdapter(pub Git);

impl QueryAdapter for BranchAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError> {
        match self.0.run(context, &["symbolic-ref", "--short", "-q", "HEAD"]) {
            Ok(branch) if !branch.is_empty() => Ok(branch),
            _ => self.0.run(context, &["rev-parse", "--short", "HEAD"]),
        }
    }
}

/// `1` when the working tree has changes (untracked files included), `0` otherwise.
#[derive(Debug)]
pub struct DirtyAdapter(pub Git);

impl QueryAdapter for DirtyAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError> {
        let status = self.0.run(context, &["status", "--porcelain", "--ignore-submodules=dirty"])?;
        Ok(if status.is_empty() { "0" } else { "1" }.to_string())
    }
}

#[derive(Debug)]
pub struct StashCountAdapter(pub Git);

impl QueryAdapter for StashCountAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError> {
        let list = self.0.run(context, &["stash", "list"])?;
        Ok(list.lines().filter(|l| !l.trim().is_empty()).count().to_string())
    }
}

/// `"<ahead> <behind>"` relative to the upstream branch.
#[derive(Debug)]
pub struct AheadBehindAdapter(pub Git);

impl QueryAdapter for AheadBehindAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError> {
        let command = ["rev-list", "--left-right", "--count", "HEAD...@{upstream}"];
        let output = self.0.run(context, &command)?;
        parse_ahead_behind(&output).ok_or_else(|| QueryError::UnexpectedOutput {
            command: format!("git {}", command.join(" ")),
            output,
        })
    }
}

#[derive(Debug)]
pub struct CommitCountAdapter(pub Git);

impl QueryAdapter for CommitCountAdapter {
    fn query(&self, context: &Path) -> Result<String, QueryError> {
        self.0.run(context, &["rev-list", "--count", "HEAD"])
    }
}

fn parse_ahead_behind(output: &str) -> Option<String> {
    let mut parts = output.split_whitespace();
    let ahead: u64 = parts.next()?.parse().ok()?;
    let behind: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(format!("{} {}", ahead, behind))
}

/// One git adapter per [`QueryKind`].
pub fn default_adapters(timeout: Duration) -> HashMap<QueryKind, Box<dyn QueryAdapter>> {
    let git = Git::new(timeout);
    let mut adapters: HashMap<QueryKind, Box<dyn QueryAdapter>> = HashMap::new();
    adapters.insert(QueryKind::Branch, Box::new(BranchAdapter(git)));
    adapters.insert(QueryKind::Dirty, Box::new(DirtyAdapter(git)));
    adapters.insert(QueryKind::StashCount, Box::new(StashCountAdapter(git)));
    adapters.insert(QueryKind::AheadBehind, Box::new(AheadBehindAdapter(git)));
    adapters.insert(QueryKind::CommitCount, Box::new(CommitCountAdapter(git)));
    adapters
}

// --- Typed Facade ---

/// Typed view of the cached answers for one working directory.
///
/// The cache stores an empty string for queries that failed; every accessor maps
/// that to `None`.
#[derive(Debug)]
pub struct RepoStatus<'a, C: Clock> {
    cache: &'a mut QueryCache<C>,
    context: PathBuf,
}

impl<'a, C: Clock> RepoStatus<'a, C> {
    pub fn new(cache: &'a mut QueryCache<C>, context: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            context: context.into(),
        }
    }

    pub fn context(&self) -> &Path {
        &self.context
    }

    /// The raw cached value, `None` when unknown.
    pub fn raw(&mut self, kind: QueryKind) -> Option<String> {
        match self.cache.get(kind, &self.context) {
            Ok(value) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                log::debug!("{}", e);
                None
            }
        }
    }

    pub fn branch(&mut self) -> Option<String> {
        self.raw(QueryKind::Branch)
    }

    pub fn is_dirty(&mut self) -> Option<bool> {
        self.raw(QueryKind::Dirty).map(|v| v == "1")
    }

    pub fn stash_count(&mut self) -> Option<u64> {
        self.raw(QueryKind::StashCount).and_then(|v| v.parse().ok())
    }

    pub fn ahead_behind(&mut self) -> Option<(u64, u64)> {
        let value = self.raw(QueryKind::AheadBehind)?;
        let (ahead, behind) = value.split_once(' ')?;
        Some((ahead.parse().ok()?, behind.parse().ok()?))
    }

    pub fn commit_count(&mut self) -> Option<u64> {
        self.raw(QueryKind::CommitCount).and_then(|v| v.parse().ok())
    }

    /// Forgets everything cached for this directory, e.g. after a commit or checkout.
    pub fn invalidate(&mut self) {
        self.cache.invalidate(&self.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ManualClock;
    use crate::models::TtlSettings;

    struct Fixed(&'static str);

    impl QueryAdapter for Fixed {
        fn query(&self, _context: &Path) -> Result<String, QueryError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl QueryAdapter for Broken {
        fn query(&self, context: &Path) -> Result<String, QueryError> {
            Err(QueryError::NotARepository(context.to_path_buf()))
        }
    }

    #[test]
    fn test_parse_ahead_behind() {
        assert_eq!(parse_ahead_behind("3\t1").as_deref(), Some("3 1"));
        assert_eq!(parse_ahead_behind("0 0\n").as_deref(), Some("0 0"));
        assert_eq!(parse_ahead_behind("x 1"), None);
        assert_eq!(parse_ahead_behind("1"), None);
    }

    #[test]
    fn test_repo_status_typed_accessors() {
        let clock = ManualClock::new();
        let mut cache = QueryCache::with_clock(TtlSettings::default(), &clock);
        cache.register(QueryKind::Branch, Box::new(Fixed("main")));
        cache.register(QueryKind::Dirty, Box::new(Fixed("1")));
        cache.register(QueryKind::StashCount, Box::new(Fixed("2")));
        cache.register(QueryKind::AheadBehind, Box::new(Fixed("3 4")));
        cache.register(QueryKind::CommitCount, Box::new(Broken));

        let mut status = RepoStatus::new(&mut cache, "/repo");
        assert_eq!(status.branch().as_deref(), Some("main"));
        assert_eq!(status.is_dirty(), Some(true));
        assert_eq!(status.stash_count(), Some(2));
        assert_eq!(status.ahead_behind(), Some((3, 4)));
        assert_eq!(status.commit_count(), None);

        status.invalidate();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_default_adapters_cover_every_kind() {
        let adapters = default_adapters(Duration::from_millis(500));
        for kind in QueryKind::ALL {
            assert!(adapters.contains_key(&kind), "missing adapter for {}", kind);
        }
    }

    #[test]
    fn test_git_outside_directory_fails_fast() {
        let adapter = CommitCountAdapter(Git::new(Duration::from_millis(500)));
        let err = adapter
            .query(Path::new("/definitely/not/a/dir"))
            .unwrap_err();
        assert!(matches!(err, QueryError::NotARepository(_)));
    }
}
