use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{CacheResult, Error};

/// Bidirectional, monotonically growing map between cache-key strings and
/// compact 64-bit identifiers (spec.md §4.1).
///
/// The teacher's own `Engine` trait is explicitly single-threaded, serialized
/// externally by an `Arc<Mutex<E>>` (`kv/src/mvcc/mvcc.rs`). This module
/// can't borrow that shape: spec.md §5 requires every registry mutation to
/// be single-operation atomic with no total ordering imposed across callers,
/// so the two tables are `dashmap`s instead, sharded internally the way a
/// single global `Mutex` around a `HashMap` pair would not be.
pub struct KeyRegistry {
    forward: DashMap<String, u64>,
    reverse: DashMap<u64, String>,
    next_id: AtomicU64,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self { forward: DashMap::new(), reverse: DashMap::new(), next_id: AtomicU64::new(0) }
    }

    /// Returns the identifier bound to `cache_key`, creating one if none
    /// exists. Idempotent under concurrency: any number of concurrent
    /// registrations of the same string return the same `id`.
    ///
    /// Identifier assignment speculatively consumes the next counter value,
    /// then attempts a compare-and-insert into the forward table. On
    /// collision (another caller won the race) the already-stored
    /// identifier is returned and the speculative value is discarded —
    /// safe because the id space is 2^63 and ids are never reused.
    pub fn register(&self, cache_key: &str) -> CacheResult<u64> {
        if let Some(existing) = self.forward.get(cache_key) {
            return Ok(*existing);
        }

        let candidate = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        if candidate == 0 {
            return Err(Error::RegistryExhausted);
        }

        match self.forward.entry(cache_key.to_string()) {
            Entry::Occupied(existing) => Ok(*existing.get()),
            Entry::Vacant(vacant) => {
                vacant.insert(candidate);
                self.reverse.insert(candidate, cache_key.to_string());
                Ok(candidate)
            }
        }
    }

    /// Looks up the cache key bound to `id`, if the binding still exists.
    pub fn lookup(&self, id: u64) -> Option<String> {
        self.reverse.get(&id).map(|entry| entry.clone())
    }

    /// Resolves every id in `ids` to its cache key, dropping ids that no
    /// longer exist (spec.md §4.4: "any ids not in `resolved` are stale
    /// references").
    pub fn resolve(&self, ids: &[u64]) -> Vec<(u64, String)> {
        ids.iter().filter_map(|&id| self.lookup(id).map(|key| (id, key))).collect()
    }

    /// Removes both directions of the mapping for `id`, if present;
    /// otherwise a no-op.
    pub fn unregister_id(&self, id: u64) {
        if let Some((_, cache_key)) = self.reverse.remove(&id) {
            self.forward.remove(&cache_key);
        }
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
