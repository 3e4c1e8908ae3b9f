// src/cli/handlers/status.rs

//! # Handler for the `status` command
//!
//! Answers every status-line query for a directory through the query cache and prints
//! `kind: value` lines. Unknown answers (not a repository, no upstream, a timed-out git)
//! print as `-`.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{
    cli::handlers::commons::{self, pad},
    core::{
        cache::{CacheError, Clock, QueryCache},
        settings::Settings,
    },
    models::QueryKind,
};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Shows the repository status for a directory, as the query cache answers it."
)]
struct StatusArgs {
    /// The directory to inspect. Defaults to the current directory.
    dir: Option<PathBuf>,

    /// Print the answers as JSON.
    #[arg(long)]
    json: bool,
}

pub fn handle(args: Vec<String>, settings: &Settings) -> Result<()> {
    let status_args = StatusArgs::try_parse_from(&args)?;
    let dir = match status_args.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let context = dunce::canonicalize(&dir).unwrap_or(dir);

    let mut cache = commons::build_query_cache(settings);
    let answers = collect_answers(&mut cache, &context)?;
    log::debug!("Query cache after status: {:?}", cache.stats());

    if status_args.json {
        return commons::print_json(&answers);
    }

    println!("{}", context.display().to_string().dimmed());
    let width = QueryKind::ALL
        .iter()
        .map(|k| k.as_str().len() + 1)
        .max()
        .unwrap_or(0);
    for kind in QueryKind::ALL {
        let value = answers.get(kind.as_str()).map_or("", String::as_str);
        let shown = if value.is_empty() {
            "-".dimmed()
        } else {
            value.normal()
        };
        println!("{} {}", pad(&format!("{}:", kind), width).cyan(), shown);
    }
    Ok(())
}

/// Asks the cache once per query kind, keyed by kind name.
fn collect_answers<C: Clock>(
    cache: &mut QueryCache<C>,
    context: &Path,
) -> Result<BTreeMap<&'static str, String>, CacheError> {
    let mut answers = BTreeMap::new();
    for kind in QueryKind::ALL {
        answers.insert(kind.as_str(), cache.get(kind, context)?);
    }
    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ManualClock;
    use crate::core::queries::{QueryAdapter, QueryError};
    use crate::models::TtlSettings;

    struct Fixed(&'static str);

    impl QueryAdapter for Fixed {
        fn query(&self, _context: &Path) -> Result<String, QueryError> {
            Ok(self.0.to_string())
        }
    }

    struct NotARepo;

    impl QueryAdapter for NotARepo {
        fn query(&self, context: &Path) -> Result<String, QueryError> {
            Err(QueryError::NotARepository(context.to_path_buf()))
        }
    }

    #[test]
    fn test_collect_answers_covers_every_kind() {
        let mut cache = QueryCache::with_clock(TtlSettings::default(), ManualClock::new());
        cache.register(QueryKind::Branch, Box::new(Fixed("main")));
        cache.register(QueryKind::Dirty, Box::new(Fixed("1")));
        cache.register(QueryKind::StashCount, Box::new(Fixed("0")));
        cache.register(QueryKind::AheadBehind, Box::new(NotARepo));
        cache.register(QueryKind::CommitCount, Box::new(Fixed("42")));

        let answers = collect_answers(&mut cache, Path::new("/work/repo")).unwrap();
        assert_eq!(answers.len(), QueryKind::ALL.len());
        assert_eq!(answers[QueryKind::Branch.as_str()], "main");
        assert_eq!(answers[QueryKind::AheadBehind.as_str()], "");
        assert_eq!(cache.stats().misses, 5);
    }

    #[test]
    fn test_collect_answers_without_adapter_fails() {
        let mut cache = QueryCache::with_clock(TtlSettings::default(), ManualClock::new());
        cache.register(QueryKind::Branch, Box::new(Fixed("main")));
        assert!(collect_answers(&mut cache, Path::new("/work/repo")).is_err());
    }

    #[test]
    fn test_status_args() {
        let args = StatusArgs::try_parse_from(["/tmp", "--json"]).unwrap();
        assert_eq!(args.dir, Some(PathBuf::from("/tmp")));
        assert!(args.json);
        assert!(StatusArgs::try_parse_from(["--invalidate"]).is_err());
    }
}
