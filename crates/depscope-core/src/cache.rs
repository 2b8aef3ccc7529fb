//! Causal path cache for one graph build generation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::model::{CausalPath, RecompileReason, RecompileSet, UnitId};

/// Key for cache lookups: `source` recompiles because of `sink`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: UnitId,
    pub sink: UnitId,
    pub reason: RecompileReason,
}

/// Paths computed by one closure pass. Thread-safe for concurrent access.
///
/// Written by a single producer, read by any number of explanation queries.
/// A rebuild replaces the whole cache instead of merging into it.
pub struct PathCache {
    generation: u64,
    built_at: DateTime<Utc>,
    paths: DashMap<CacheKey, CausalPath>,
    ready: AtomicBool,
}

impl std::fmt::Debug for PathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCache")
            .field("generation", &self.generation)
            .field("entries", &self.paths.len())
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl PathCache {
    pub fn new(generation: u64) -> Self {
        PathCache {
            generation,
            built_at: Utc::now(),
            paths: DashMap::new(),
            ready: AtomicBool::new(false),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store a path. Overwrites are idempotent within one generation.
    pub fn insert(&self, source: &str, sink: &str, reason: RecompileReason, path: CausalPath) {
        let key = CacheKey {
            source: source.to_string(),
            sink: sink.to_string(),
            reason,
        };
        self.paths.insert(key, path);
    }

    /// Look up the path explaining why `source` recompiles because of `sink`.
    pub fn get(&self, source: &str, sink: &str, reason: RecompileReason) -> Option<CausalPath> {
        let key = CacheKey {
            source: source.to_string(),
            sink: sink.to_string(),
            reason,
        };
        self.paths.get(&key).map(|r| r.value().clone())
    }

    /// Insert every path of a closure pass, then mark the cache ready.
    pub fn populate(&self, closures: &BTreeMap<UnitId, RecompileSet>) -> usize {
        let mut inserted = 0;
        for (source, set) in closures {
            for (reason, sink, path) in set.iter() {
                self.insert(source, sink, reason, path.clone());
                inserted += 1;
            }
        }
        self.mark_ready();
        tracing::debug!(
            "Path cache generation {} populated with {} entries in {} ms",
            self.generation,
            inserted,
            (Utc::now() - self.built_at).num_milliseconds()
        );
        inserted
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// True once population finished.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
