// src/cli/handlers/commons.rs

// Shared helpers used by multiple handlers.

use anyhow::Result;
use colored::Colorize;
use dialoguer::console::measure_text_width;
use serde::Serialize;

use crate::{
    core::{
        cache::QueryCache, loader::Loader, orchestrator::Orchestrator, queries, registry::Registry,
        settings::Settings,
    },
    models::LoadSession,
};

/// Builds an orchestrator over the configured modules directory and disabled list.
pub fn build_orchestrator(settings: &Settings, benchmark: bool) -> Orchestrator {
    let registry = Registry::new(&settings.modules_dir, settings.disabled.clone());
    let loader = Loader::new(settings.benchmark || benchmark);
    Orchestrator::new(registry, loader, settings.verbose)
}

/// A system-clock cache with the git adapters registered for every query kind.
pub fn build_query_cache(settings: &Settings) -> QueryCache {
    let mut cache =
        QueryCache::new(settings.cache.ttl.clone()).with_failure_ttl(settings.failure_ttl());
    cache.register_all(queries::default_adapters(settings.query_timeout()));
    cache
}

/// Pretty-prints any serializable value as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints the benchmark table, slowest module first.
pub fn print_timing_report(session: &LoadSession) {
    let rows = session.timing_report();
    if rows.is_empty() {
        return;
    }

    eprintln!("\n{}", t!("load.bench.header").bold());
    let width = rows
        .iter()
        .map(|r| measure_text_width(&r.name))
        .max()
        .unwrap_or(0);
    for row in &rows {
        let padding = " ".repeat(width.saturating_sub(measure_text_width(&row.name)));
        eprintln!(
            "  {}{}  {:>9.2} ms  {:>5.1}%",
            row.name.cyan(),
            padding,
            row.duration.as_secs_f64() * 1000.0,
            row.percent
        );
    }
    eprintln!(
        "  {}",
        format!(
            t!("load.bench.total"),
            total = format!("{:.2}", session.total_duration().as_secs_f64() * 1000.0)
        )
        .dimmed()
    );
}

/// Left-aligns `text` in a column of `width` visible characters, ignoring ANSI codes.
pub fn pad(text: &str, width: usize) -> String {
    let padding = width.saturating_sub(measure_text_width(text));
    format!("{}{}", text, " ".repeat(padding))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_ignores_ansi_codes() {
        let colored = format!("\x1b[32m{}\x1b[0m", "ok");
        assert_eq!(measure_text_width(&pad(&colored, 6)), 6);
        assert_eq!(pad("toolong", 3), "toolong");
    }
}
