//! End-to-end scenarios and invariants for the cache engine, run against the
//! conformance backend. Each test is named after the property it checks.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

use smkes::backend::memory::MemoryBackend;
use smkes::backend::{Backend, Bytes, NativeSetOps};
use smkes::engine::{CacheEngine, Outcome, UpdateStrategy};
use smkes::key::{CanonicalKeyDeriver, KeyDeriver, Params};
use smkes::record::{RecordIdentity, ScalarValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

impl RecordIdentity for User {
    fn type_tag(&self) -> &'static str {
        "user"
    }

    fn primary_key(&self) -> Vec<ScalarValue> {
        vec![self.id.into()]
    }
}

fn id_params(id: u64) -> Params {
    let mut p = Params::new();
    p.insert("id".to_string(), json!(id));
    p
}

fn active_params(active: bool) -> Params {
    let mut p = Params::new();
    p.insert("active".to_string(), json!(active));
    p
}

fn cache_key(key: &str, params: &Params) -> String {
    CanonicalKeyDeriver::new().derive(key, params).unwrap()
}

fn expect_record<R: std::fmt::Debug>(outcome: Outcome<R>) -> R {
    match outcome {
        Outcome::Record(r) => r,
        Outcome::List(l) => panic!("expected a record, got a list: {l:?}"),
        Outcome::Err(e) => panic!("expected a record, got an error: {e}"),
    }
}

fn expect_list<R: std::fmt::Debug>(outcome: Outcome<R>) -> Vec<R> {
    match outcome {
        Outcome::List(l) => l,
        Outcome::Record(r) => panic!("expected a list, got a record: {r:?}"),
        Outcome::Err(e) => panic!("expected a list, got an error: {e}"),
    }
}

/// S1 Read-through hit.
#[tokio::test]
async fn s1_read_through_hit() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let params = id_params(5);

    let outcome = engine
        .read("find_user", &params, None, || async {
            Outcome::Record(User { id: 5, name: "alice".to_string() })
        })
        .await;
    assert_eq!(expect_record(outcome), User { id: 5, name: "alice".to_string() });

    // a second read with a fetch that would panic still returns the cached value.
    let outcome = engine
        .read("find_user", &params, None, || async {
            panic!("fetch should not run on a cache hit")
        })
        .await;
    assert_eq!(expect_record(outcome), User { id: 5, name: "alice".to_string() });
}

/// Invariant 2: reading an empty list never caches; the fetch is re-invoked
/// on every call.
#[tokio::test]
async fn empty_list_is_never_cached() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let params = active_params(true);

    let calls = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
    for _ in 0..3 {
        let calls = calls.clone();
        let outcome = engine
            .read("all_users", &params, None, || async move {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Outcome::<User>::List(vec![])
            })
            .await;
        assert!(expect_list(outcome).is_empty());
    }
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
}

/// S2 Create evicts collections only.
#[tokio::test]
async fn s2_create_evicts_collections_only() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let all_users_params = active_params(true);
    let find_user_params = id_params(1);

    engine
        .read("all_users", &all_users_params, None, || async {
            Outcome::List(vec![User { id: 1, name: "alice".to_string() }])
        })
        .await;
    engine
        .read("find_user", &find_user_params, None, || async {
            Outcome::Record(User { id: 1, name: "alice".to_string() })
        })
        .await;

    engine
        .create(|| async { Outcome::Record(User { id: 2, name: "bob".to_string() }) })
        .await;

    let all_users_key = cache_key("all_users", &all_users_params);
    let find_user_key = cache_key("find_user", &find_user_params);
    assert_eq!(engine.backend().get(&all_users_key).await.unwrap(), None);
    assert!(engine.backend().get(&find_user_key).await.unwrap().is_some());
}

/// S3 Update evict (default strategy).
#[tokio::test]
async fn s3_update_evict_clears_both_instance_and_collection_entries() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let all_users_params = active_params(true);
    let find_user_params = id_params(1);

    engine
        .read("all_users", &all_users_params, None, || async {
            Outcome::List(vec![User { id: 1, name: "alice".to_string() }])
        })
        .await;
    engine
        .read("find_user", &find_user_params, None, || async {
            Outcome::Record(User { id: 1, name: "alice".to_string() })
        })
        .await;

    engine
        .update(
            || async { Outcome::Record(User { id: 1, name: "bob".to_string() }) },
            UpdateStrategy::Evict,
            None,
        )
        .await;

    let all_users_key = cache_key("all_users", &all_users_params);
    let find_user_key = cache_key("find_user", &find_user_params);
    assert_eq!(engine.backend().get(&all_users_key).await.unwrap(), None);
    assert_eq!(engine.backend().get(&find_user_key).await.unwrap(), None);
}

/// S4 Update write-through collection.
#[tokio::test]
async fn s4_update_write_through_rewrites_both_entries_in_place() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let all_users_params = active_params(true);
    let find_user_params = id_params(1);

    engine
        .read("all_users", &all_users_params, None, || async {
            Outcome::List(vec![User { id: 1, name: "alice".to_string() }])
        })
        .await;
    engine
        .read("find_user", &find_user_params, None, || async {
            Outcome::Record(User { id: 1, name: "alice".to_string() })
        })
        .await;

    engine
        .update(
            || async { Outcome::Record(User { id: 1, name: "bob".to_string() }) },
            UpdateStrategy::WriteThrough,
            None,
        )
        .await;

    // next reads hit the rewritten entries; fetch is never invoked.
    let outcome = engine
        .read("find_user", &find_user_params, None, || async {
            panic!("fetch should not run, entry was write-through updated")
        })
        .await;
    assert_eq!(expect_record(outcome), User { id: 1, name: "bob".to_string() });

    let outcome = engine
        .read("all_users", &all_users_params, None, || async {
            panic!("fetch should not run, entry was write-through updated")
        })
        .await;
    assert_eq!(expect_list(outcome), vec![User { id: 1, name: "bob".to_string() }]);
}

/// Invariant 3 / delete: after flush(record), every cache entry that
/// contained it reads back as a miss.
#[tokio::test]
async fn delete_flushes_every_entry_containing_the_record() {
    let engine = CacheEngine::new(MemoryBackend::new());
    let find_user_params = id_params(1);

    engine
        .read("find_user", &find_user_params, None, || async {
            Outcome::Record(User { id: 1, name: "alice".to_string() })
        })
        .await;

    engine
        .delete(|| async { Outcome::Record(User { id: 1, name: "alice".to_string() }) })
        .await;

    let find_user_key = cache_key("find_user", &find_user_params);
    assert_eq!(engine.backend().get(&find_user_key).await.unwrap(), None);
}

/// S6 Concurrent fanout: 50 parallel reads that each associate User{id:1}
/// with a distinct cache key leave the instance set with exactly 50 members.
#[tokio::test]
async fn s6_concurrent_fanout_converges_on_exactly_n_members() {
    let engine = CacheEngine::new(MemoryBackend::new());

    let mut handles = Vec::new();
    for i in 0..50u64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut params = Params::new();
            params.insert("i".to_string(), json!(i));
            engine
                .read(&format!("q_{i}"), &params, None, || async {
                    Outcome::Record(User { id: 1, name: "alice".to_string() })
                })
                .await;
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let members = engine
        .backend()
        .native_sets()
        .unwrap()
        .set_members("__set:user:1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(members.len(), 50);
}

/// A backend wrapper whose `multi_get` always fails, used to exercise the
/// advisory-failure path of `flush` (spec.md §4.4/§7, invariant 8).
struct FailingMultiGet(MemoryBackend);

#[async_trait]
impl Backend for FailingMultiGet {
    async fn get(&self, key: &str) -> smkes::CacheResult<Option<Bytes>> {
        self.0.get(key).await
    }

    async fn put(&self, key: &str, value: Bytes, ttl: Option<std::time::Duration>) -> smkes::CacheResult<()> {
        self.0.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> smkes::CacheResult<()> {
        self.0.delete(key).await
    }

    async fn multi_get(&self, _keys: &[String]) -> smkes::CacheResult<Vec<Option<Bytes>>> {
        Err(smkes::Error::Backend("simulated outage".to_string()))
    }

    fn native_sets(&self) -> Option<&dyn NativeSetOps> {
        self.0.native_sets()
    }
}

/// Invariant 8: a `multi_get` failure during `flush` leaves the cache and
/// index unchanged and the call still returns `Ok`.
#[tokio::test]
async fn multi_get_failure_during_flush_leaves_state_unchanged_and_returns_ok() {
    let engine = CacheEngine::new(FailingMultiGet(MemoryBackend::new()));
    let find_user_params = id_params(1);

    engine
        .read("find_user", &find_user_params, None, || async {
            Outcome::Record(User { id: 1, name: "alice".to_string() })
        })
        .await;

    let result = engine.flush(&User { id: 1, name: "alice".to_string() }).await;
    assert!(result.is_ok());

    // the entry is untouched: the cache value is still present.
    let find_user_key = cache_key("find_user", &find_user_params);
    assert!(engine.backend().get(&find_user_key).await.unwrap().is_some());
}
