//! Reverse Index (spec.md §3, §4.4): the logical layer that maintains, per
//! record identity and per record type, the set of cache-key identifiers
//! whose values contain that record. Holds no state of its own — every
//! mutation is dispatched through the Backend Adapter's capability-resolved
//! set operations (native, then the Set Lock fallback); this module is
//! purely the naming convention plus the dispatch `if`.

use crate::backend::{Backend, Capabilities};
use crate::config::EngineConfig;
use crate::error::CacheResult;
use crate::set_lock::SetLock;

pub struct ReverseIndex {
    capabilities: Capabilities,
    fallback: SetLock,
}

impl ReverseIndex {
    pub fn new(backend: &dyn Backend, lock_partition_multiplier: usize) -> Self {
        Self {
            capabilities: Capabilities::probe(backend),
            fallback: SetLock::new(lock_partition_multiplier),
        }
    }

    pub fn with_config(backend: &dyn Backend, config: &EngineConfig) -> Self {
        Self {
            capabilities: Capabilities::probe(backend),
            fallback: SetLock::with_retry_budget(
                config.lock_partition_multiplier,
                config.lock_retry_attempts,
                config.lock_retry_backoff,
            ),
        }
    }

    pub async fn sadd(&self, backend: &dyn Backend, set_key: &str, member: u64) -> CacheResult<()> {
        if let Some(native) = backend.native_sets() {
            return native.set_add(set_key, member).await;
        }
        if let Some(raw) = backend.raw_set_commands() {
            return raw.set_add(set_key, member).await;
        }
        self.fallback.sadd(backend, set_key, member).await
    }

    pub async fn srem(&self, backend: &dyn Backend, set_key: &str, member: u64) -> CacheResult<()> {
        if let Some(native) = backend.native_sets() {
            return native.set_remove(set_key, member).await;
        }
        if let Some(raw) = backend.raw_set_commands() {
            return raw.set_remove(set_key, member).await;
        }
        self.fallback.srem(backend, set_key, member).await
    }

    pub async fn smembers(&self, backend: &dyn Backend, set_key: &str) -> CacheResult<Option<Vec<u64>>> {
        if let Some(native) = backend.native_sets() {
            return native.set_members(set_key).await;
        }
        if let Some(raw) = backend.raw_set_commands() {
            return raw.set_members(set_key).await;
        }
        self.fallback.smembers(backend, set_key).await
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
