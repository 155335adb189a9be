//! Backend Adapter contract (spec.md §4.2): an abstract key-value store with
//! three required operations and a handful of independently optional ones,
//! resolved once into a capability record and dispatched on at each call
//! site. Grounded on the teacher's `storage::engine::Engine` trait shape
//! (`kv/src/storage/engine.rs`) — a `Send + Sync` trait returning a crate
//! `CacheResult` — made `async` via `async_trait`, since this crate (unlike
//! the teacher's intentionally single-threaded `Engine`) must support any
//! number of concurrent callers without one external lock (spec.md §5).

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

/// An opaque, already-encoded cache value or set payload.
pub type Bytes = Vec<u8>;

/// Required operations every Backend Adapter must provide (spec.md §4.2).
/// Returns `Ok(None)` — not an error — on a miss, per spec.md §6.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;

    async fn put(&self, key: &str, value: Bytes, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Optional batch read. Default implementation issues sequential
    /// individual `get`s, which is always correct; a backend with a genuine
    /// batch primitive overrides this for one round trip.
    async fn multi_get(&self, keys: &[String]) -> CacheResult<Vec<Option<Bytes>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(key).await?);
        }
        Ok(out)
    }

    /// Native server-side set operations, if this backend has them (e.g. a
    /// remote store with `SADD`/`SREM`/`SMEMBERS`). `None` means the Set
    /// Lock fallback (`crate::set_lock`) must be used instead.
    fn native_sets(&self) -> Option<&dyn NativeSetOps> {
        None
    }

    /// A generic command interface some backends expose (e.g. Redis `EVAL`)
    /// that can emulate set semantics without being a first-class
    /// `NativeSetOps` implementation. This is the dispatch tier between
    /// native sets and the Set Lock fallback (spec.md §4.2 item 2). No
    /// bundled backend implements this; the seam exists so a future adapter
    /// can without an engine change.
    fn raw_set_commands(&self) -> Option<&dyn RawSetCommands> {
        None
    }
}

/// Server-side set mutation/read capability (spec.md §4.2, §4.3).
/// Single-operation atomic when backed by a real server-side set.
#[async_trait]
pub trait NativeSetOps: Send + Sync {
    async fn set_add(&self, set_key: &str, member: u64) -> CacheResult<()>;

    async fn set_remove(&self, set_key: &str, member: u64) -> CacheResult<()>;

    /// `Ok(None)` on an absent or empty set; otherwise `Ok(Some(members))`
    /// in unspecified order.
    async fn set_members(&self, set_key: &str) -> CacheResult<Option<Vec<u64>>>;
}

/// The second dispatch tier for backends that expose a generic command
/// interface instead of first-class set operations. Shares `NativeSetOps`'s
/// signature; kept as a distinct trait so `Backend::native_sets` and
/// `Backend::raw_set_commands` can be resolved independently at startup.
#[async_trait]
pub trait RawSetCommands: Send + Sync {
    async fn set_add(&self, set_key: &str, member: u64) -> CacheResult<()>;

    async fn set_remove(&self, set_key: &str, member: u64) -> CacheResult<()>;

    async fn set_members(&self, set_key: &str) -> CacheResult<Option<Vec<u64>>>;
}

/// A flat record of which optional operations a bound `Backend` supports,
/// resolved once at startup and consulted at every runtime call site
/// (spec.md §4.2, §9: "capabilities are resolved once to a flat record of
/// booleans; dispatch is by if-else on that record").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub has_native_sets: bool,
    pub has_raw_set_commands: bool,
}

impl Capabilities {
    pub fn probe(backend: &dyn Backend) -> Self {
        Self {
            has_native_sets: backend.native_sets().is_some(),
            has_raw_set_commands: backend.raw_set_commands().is_some(),
        }
    }
}

/// Generates the common conformance suite for any `Backend` implementation,
/// mirroring the teacher's `test_engine!` macro (`kv/src/storage/mod.rs`):
/// point operations, multi-get, and (when native sets are present) set
/// mutation semantics, run identically against every adapter.
#[cfg(test)]
macro_rules! test_backend {
    ($setup:expr) => {
        #[tokio::test]
        async fn point_ops() {
            let backend = $setup;
            assert_eq!(backend.get("a").await.unwrap(), None);

            backend.put("a", vec![1], None).await.unwrap();
            assert_eq!(backend.get("a").await.unwrap(), Some(vec![1]));

            backend.put("a", vec![2], None).await.unwrap();
            assert_eq!(backend.get("a").await.unwrap(), Some(vec![2]));

            backend.delete("a").await.unwrap();
            assert_eq!(backend.get("a").await.unwrap(), None);

            // deletes are idempotent.
            backend.delete("a").await.unwrap();
        }

        #[tokio::test]
        async fn multi_get_reports_one_entry_per_key_with_none_for_misses() {
            let backend = $setup;
            backend.put("a", vec![1], None).await.unwrap();
            backend.put("c", vec![3], None).await.unwrap();

            let got = backend.multi_get(&["a".to_string(), "b".to_string(), "c".to_string()]).await.unwrap();
            assert_eq!(got, vec![Some(vec![1]), None, Some(vec![3])]);
        }

        #[tokio::test]
        async fn set_members_is_none_when_absent() {
            let backend = $setup;
            if let Some(sets) = backend.native_sets() {
                assert_eq!(sets.set_members("__set:user:1").await.unwrap(), None);
            }
        }

        #[tokio::test]
        async fn concurrent_sadd_of_distinct_members_converges_on_all_of_them() {
            let backend = std::sync::Arc::new($setup);
            if backend.native_sets().is_none() {
                return;
            }

            let mut handles = Vec::new();
            for i in 0..50u64 {
                let backend = backend.clone();
                handles.push(tokio::spawn(async move {
                    backend.native_sets().unwrap().set_add("__set:user:1", i).await.unwrap();
                }));
            }
            for h in handles {
                h.await.unwrap();
            }

            let members = backend.native_sets().unwrap().set_members("__set:user:1").await.unwrap().unwrap();
            assert_eq!(members.len(), 50);
        }

        #[tokio::test]
        async fn srem_of_the_last_member_empties_the_set() {
            let backend = $setup;
            let Some(sets) = backend.native_sets() else { return };

            sets.set_add("__set:user:1", 7).await.unwrap();
            sets.set_remove("__set:user:1", 7).await.unwrap();
            assert_eq!(sets.set_members("__set:user:1").await.unwrap(), None);
        }
    };
}

#[cfg(test)]
pub(crate) use test_backend;
