//! Conformance backend (spec.md §6): a minimal in-process two-table store —
//! one map for values, one multi-valued map for sets — that natively
//! supports every optional capability. TTL is accepted and ignored.
//!
//! Grounded on the teacher's `storage::memory::Memory` engine
//! (`kv/src/storage/memory.rs`): a single `BTreeMap`-backed store with a
//! `new()` constructor and no persistence. Generalized here from one table
//! to a value table plus a set table, and from a single-threaded `&mut self`
//! API to a concurrent one, since this backend must be shared across
//! whatever number of callers the cache engine serves at once.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::backend::{Backend, Bytes, NativeSetOps};
use crate::error::CacheResult;

pub struct MemoryBackend {
    values: DashMap<String, Bytes>,
    sets: DashMap<String, Vec<u64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { values: DashMap::new(), sets: DashMap::new() }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn put(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> CacheResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.values.remove(key);
        Ok(())
    }

    fn native_sets(&self) -> Option<&dyn NativeSetOps> {
        Some(self)
    }
}

#[async_trait]
impl NativeSetOps for MemoryBackend {
    async fn set_add(&self, set_key: &str, member: u64) -> CacheResult<()> {
        let mut entry = self.sets.entry(set_key.to_string()).or_default();
        if !entry.contains(&member) {
            entry.push(member);
        }
        Ok(())
    }

    async fn set_remove(&self, set_key: &str, member: u64) -> CacheResult<()> {
        if let Some(mut entry) = self.sets.get_mut(set_key) {
            entry.retain(|&m| m != member);
            if entry.is_empty() {
                drop(entry);
                self.sets.remove(set_key);
            }
        }
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> CacheResult<Option<Vec<u64>>> {
        match self.sets.get(set_key) {
            Some(members) if !members.is_empty() => Ok(Some(members.clone())),
            _ => Ok(None),
        }
    }
}



/// A wrapper that strips `native_sets`/`raw_set_commands` from an otherwise
/// fully capable backend, so the Set Lock fallback path (`crate::set_lock`)
/// can be exercised against the exact same conformance suite as the native
/// path (`crate::backend::test_backend!`).
pub struct NoNativeSets<B: Backend>(pub B);

#[async_trait]
impl<B: Backend> Backend for NoNativeSets<B> {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        self.0.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> CacheResult<()> {
        self.0.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.0.delete(key).await
    }

    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Bytes>>> {
        self.0.multi_get(keys).await
    }

    // deliberately does not forward native_sets / raw_set_commands.
}
