// src/core/cache.rs

//! # Query Cache
//!
//! An in-memory TTL memo in front of the query adapters. The status line asks the same
//! questions on every redraw; the cache answers from memory until an entry's TTL runs out.
//!
//! - Keys are `(QueryKind, context directory)`, so two repositories never share an answer.
//! - An entry is live while `now - stored_at < ttl`. Expired entries are recomputed in place.
//! - A failing adapter is memoized too, as an empty string, so a broken tool is not
//!   re-run on every redraw.
//! - Time is read through [`Clock`], which tests replace with [`ManualClock`].

use crate::{
    core::queries::QueryAdapter,
    models::{QueryKind, TtlSettings},
};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("No query adapter is registered for '{0}'.")]
    NoAdapter(QueryKind),
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: String,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a live entry.
    pub hits: u64,
    /// Computed because no entry existed.
    pub misses: u64,
    /// Recomputed because the entry had expired.
    pub refreshes: u64,
}

pub struct QueryCache<C: Clock = SystemClock> {
    adapters: HashMap<QueryKind, Box<dyn QueryAdapter>>,
    entries: HashMap<(QueryKind, PathBuf), CacheEntry>,
    ttls: TtlSettings,
    failure_ttl: Option<Duration>,
    clock: C,
    stats: CacheStats,
}

impl<C: Clock> std::fmt::Debug for QueryCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("entries", &self.entries.len())
            .field("ttls", &self.ttls)
            .field("failure_ttl", &self.failure_ttl)
            .field("stats", &self.stats)
            .finish()
    }
}

impl QueryCache<SystemClock> {
    pub fn new(ttls: TtlSettings) -> Self {
        Self::with_clock(ttls, SystemClock)
    }
}

impl<C: Clock> QueryCache<C> {
    pub fn with_clock(ttls: TtlSettings, clock: C) -> Self {
        Self {
            adapters: HashMap::new(),
            entries: HashMap::new(),
            ttls,
            failure_ttl: None,
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Memoizes failed queries for `ttl` instead of the kind's normal TTL.
    pub fn with_failure_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.failure_ttl = ttl;
        self
    }

    /// Registers (or replaces) the adapter answering `kind`.
    pub fn register(&mut self, kind: QueryKind, adapter: Box<dyn QueryAdapter>) {
        self.adapters.insert(kind, adapter);
    }

    pub fn register_all(&mut self, adapters: HashMap<QueryKind, Box<dyn QueryAdapter>>) {
        self.adapters.extend(adapters);
    }

    pub fn ttl(&self, kind: QueryKind) -> Duration {
        self.ttls.ttl_for(kind)
    }

    /// Returns the memoized answer for `(kind, context)`, computing it on a miss or
    /// after expiry.
    pub fn get(&mut self, kind: QueryKind, context: &Path) -> Result<String, CacheError> {
        let now = self.clock.now();
        let key = (kind, context.to_path_buf());

        let expired = match self.entries.get(&key) {
            Some(entry) if entry.is_live(now) => {
                self.stats.hits += 1;
                return Ok(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        let adapter = self.adapters.get(&kind).ok_or(CacheError::NoAdapter(kind))?;
        let (value, ttl) = match adapter.query(context) {
            Ok(value) => (value, self.ttls.ttl_for(kind)),
            Err(e) => {
                log::debug!("Query '{}' failed in '{}': {}", kind, context.display(), e);
                (String::new(), self.failure_ttl.unwrap_or_else(|| self.ttls.ttl_for(kind)))
            }
        };

        if expired {
            self.stats.refreshes += 1;
        } else {
            self.stats.misses += 1;
        }
        self.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                stored_at: now,
                ttl,
            },
        );
        Ok(value)
    }

    /// Peeks at a live entry without computing anything.
    pub fn lookup(&self, kind: QueryKind, context: &Path) -> Option<&CacheEntry> {
        let now = self.clock.now();
        self.entries
            .get(&(kind, context.to_path_buf()))
            .filter(|e| e.is_live(now))
    }

    /// Drops every entry for `context`, whatever its kind.
    pub fn invalidate(&mut self, context: &Path) {
        let before = self.entries.len();
        self.entries.retain(|(_, ctx), _| ctx != context);
        log::debug!(
            "Invalidated {} cache entries for '{}'",
            before - self.entries.len(),
            context.display()
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
