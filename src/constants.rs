// src/constants.rs

/// The name of the configuration directory (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "shellmods";

/// The name of the optional settings file (inside the config directory).
pub const SETTINGS_FILENAME: &str = "config.toml";

/// The default name of the modules directory (inside the config directory).
pub const MODULES_DIR_NAME: &str = "modules";

/// Overrides the modules directory.
pub const ENV_MODULES_DIR: &str = "SHELLMODS_MODULES_DIR";

/// Comma-delimited list of disabled module names.
pub const ENV_DISABLED: &str = "SHELLMODS_DISABLED";

/// Boolean toggle for load progress output.
pub const ENV_VERBOSE: &str = "SHELLMODS_VERBOSE";

/// Boolean toggle for per-module timing.
pub const ENV_BENCHMARK: &str = "SHELLMODS_BENCHMARK";

/// Priority assigned to modules that declare none.
pub const DEFAULT_PRIORITY: i64 = 50;

/// Width of the first-issue column in the health report.
pub const ISSUE_SUMMARY_WIDTH: usize = 48;

/// How deep `source` may nest before it is treated as a loop.
pub const MAX_SOURCE_DEPTH: usize = 8;

/// Subprocess budget for a single status query.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 500;
