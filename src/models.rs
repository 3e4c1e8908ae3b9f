// src/models.rs

use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// --- MODULE MODELS ---

/// The outcome of loading a single module.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Metadata parsed once from a module's filename and header comments.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    pub name: String,
    pub priority: i64,
    pub version: Option<String>,
    pub description: Option<String>,
}

/// A discovered module: its manifest, where it lives, and its current state.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Module {
    #[serde(flatten)]
    pub manifest: ModuleManifest,
    pub path: PathBuf,
    pub enabled: bool,
    pub last_load_status: Option<LoadStatus>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn priority(&self) -> i64 {
        self.manifest.priority
    }
}

// --- LOAD SESSION MODELS ---

/// The result of loading one module within a session.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ModuleOutcome {
    pub name: String,
    pub status: LoadStatus,
    pub error: Option<String>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Option<Duration>,
}

impl ModuleOutcome {
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LoadStatus::Success,
            error: None,
            duration: None,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LoadStatus::Skipped,
            error: None,
            duration: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: LoadStatus::Failed,
            error: Some(error.into()),
            duration: None,
        }
    }
}

/// One row of the benchmark report.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TimingRow {
    pub name: String,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_millis")]
    pub duration: Duration,
    pub percent: f64,
}

/// The immutable record of one load or reload pass, in load order.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct LoadSession {
    outcomes: Vec<ModuleOutcome>,
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

impl LoadSession {
    pub fn from_outcomes(outcomes: Vec<ModuleOutcome>) -> Self {
        let count = |status| outcomes.iter().filter(|o| o.status == status).count();
        let (succeeded, failed, skipped) = (
            count(LoadStatus::Success),
            count(LoadStatus::Failed),
            count(LoadStatus::Skipped),
        );
        Self {
            outcomes,
            succeeded,
            failed,
            skipped,
        }
    }

    pub fn outcomes(&self) -> &[ModuleOutcome] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn outcome(&self, name: &str) -> Option<&ModuleOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub fn total_duration(&self) -> Duration {
        self.outcomes.iter().filter_map(|o| o.duration).sum()
    }

    /// Timed modules, slowest first, with their share of the total load time.
    pub fn timing_report(&self) -> Vec<TimingRow> {
        let total = self.total_duration().as_secs_f64();
        let mut rows: Vec<TimingRow> = self
            .outcomes
            .iter()
            .filter_map(|o| {
                o.duration.map(|duration| TimingRow {
                    name: o.name.clone(),
                    duration,
                    percent: if total > 0.0 {
                        duration.as_secs_f64() / total * 100.0
                    } else {
                        0.0
                    },
                })
            })
            .collect();
        rows.sort_by(|a, b| b.duration.cmp(&a.duration).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}

fn serialize_millis<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
        None => s.serialize_none(),
    }
}

fn serialize_duration_millis<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.as_secs_f64() * 1000.0)
}

// --- HEALTH CHECK MODELS ---

/// Diagnostic result for a single module.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleHealth {
    pub name: String,
    pub path: PathBuf,
    pub pass: bool,
    pub issues: Vec<String>,
    pub version: Option<String>,
}

/// Aggregate diagnostics across every discovered module.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub modules: Vec<ModuleHealth>,
}

impl HealthReport {
    pub fn passed(&self) -> usize {
        self.modules.iter().filter(|m| m.pass).count()
    }

    pub fn failed(&self) -> usize {
        self.modules.iter().filter(|m| !m.pass).count()
    }
}

// --- QUERY MODELS ---

/// The questions the status line asks about a working directory.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Branch,
    Dirty,
    StashCount,
    AheadBehind,
    CommitCount,
}

impl QueryKind {
    pub const ALL: [Self; 5] = [
        Self::Branch,
        Self::Dirty,
        Self::StashCount,
        Self::AheadBehind,
        Self::CommitCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Dirty => "dirty",
            Self::StashCount => "stash_count",
            Self::AheadBehind => "ahead_behind",
            Self::CommitCount => "commit_count",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- `config.toml` MODELS ---

/// The deserialized structure of `config.toml`. Every field is optional.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SettingsFile {
    pub modules_dir: Option<String>,
    pub verbose: Option<bool>,
    pub benchmark: Option<bool>,
    pub editor: Option<String>,
    pub shell: Option<String>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub shells: HashMap<String, ShellConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// When set, failed queries are memoized for this long instead of the kind's TTL.
    pub failure_ttl_secs: Option<u64>,
    #[serde(default)]
    pub ttl: TtlSettings,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            failure_ttl_secs: None,
            ttl: TtlSettings::default(),
        }
    }
}

fn default_query_timeout_ms() -> u64 {
    crate::constants::DEFAULT_QUERY_TIMEOUT_MS
}

/// Per-kind time-to-live, in seconds.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TtlSettings {
    pub branch: u64,
    pub dirty: u64,
    pub stash_count: u64,
    pub ahead_behind: u64,
    pub commit_count: u64,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            branch: 5,
            dirty: 2,
            stash_count: 30,
            ahead_behind: 30,
            commit_count: 300,
        }
    }
}

impl TtlSettings {
    pub fn ttl_for(&self, kind: QueryKind) -> Duration {
        let secs = match kind {
            QueryKind::Branch => self.branch,
            QueryKind::Dirty => self.dirty,
            QueryKind::StashCount => self.stash_count,
            QueryKind::AheadBehind => self.ahead_behind,
            QueryKind::CommitCount => self.commit_count,
        };
        Duration::from_secs(secs)
    }
}

/// How to launch one interactive shell for `shellmods shell`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub path: PathBuf,
    pub interactive_args: Option<Vec<String>>,
}
