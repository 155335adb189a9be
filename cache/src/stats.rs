//! Engine counters (SPEC_FULL.md §5), grounded on the `CacheStats` struct in
//! the pack's `xxnuo-open-webui` cache module. Observability only — nothing
//! here changes cache semantics, and nothing here is consulted by the
//! engine to make a decision; spec.md's Non-goals exclude a built-in
//! expiration clock and cross-process coordination, not a set of plain
//! counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    write_throughs: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_through(&self) {
        self.write_throughs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            write_throughs: self.write_throughs.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_throughs: u64,
}
