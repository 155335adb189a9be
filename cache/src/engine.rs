//! Cache Engine (spec.md §4.4): the public surface of this crate. Coordinates
//! the Backend Adapter, the Key Registry, and the Reverse Index behind
//! `read`, `create`, `update`, `delete`, `flush`, `flush_new`, and
//! `direct_write_through`.
//!
//! Grounded on `kv/src/mvcc/mvcc.rs`'s `MVCC<E>`: a small façade type that
//! owns an `Arc`-shared core and hands out a cheap `Clone` to callers,
//! coordinating a raw storage engine with bookkeeping the engine itself
//! doesn't persist (there, transaction state; here, the reverse index and
//! registry).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::error::{CacheResult, Error};
use crate::key::{CanonicalKeyDeriver, KeyDeriver, Params};
use crate::record::{instance_set_key, type_set_key, RecordIdentity};
use crate::registry::KeyRegistry;
use crate::reverse_index::ReverseIndex;
use crate::stats::{EngineStats, StatsSnapshot};

/// The callback return-shape tolerance from spec.md §4.4: a fetch/mutation
/// callback returns one of a singular record, a (possibly empty) list of
/// records, or an error to pass through uncached. Only `Record` triggers
/// index updates for the mutation operations; only `Record` or a non-empty
/// `List` triggers association for `read`.
pub enum Outcome<R> {
    Record(R),
    List(Vec<R>),
    Err(Error),
}

/// The on-the-wire shape a cache entry's bytes decode to: singular record or
/// a list of them. This is this crate's equivalent of the teacher's codec
/// envelope (`kv/src/codec/json_codec.rs`), generalized from raw bytes to a
/// record-shaped value.
#[derive(Serialize, serde::Deserialize)]
enum CachedValue<R> {
    Single(R),
    List(Vec<R>),
}

fn encode<R: Serialize>(value: &CachedValue<R>) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::Value(e.to_string()))
}

fn decode<R: DeserializeOwned>(bytes: &[u8]) -> CacheResult<CachedValue<R>> {
    serde_json::from_slice(bytes).map_err(|e| Error::Value(e.to_string()))
}

/// Mutation eviction strategy (spec.md §4.4 `update`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    #[default]
    Evict,
    WriteThrough,
}

struct Core<B: Backend> {
    backend: B,
    registry: KeyRegistry,
    reverse_index: ReverseIndex,
    key_deriver: CanonicalKeyDeriver,
    config: EngineConfig,
    stats: EngineStats,
}

/// The public cache engine. Cheap to `Clone` — every clone shares the same
/// backend binding, registry, and reverse index (spec.md §5: "the
/// capability record and the adapter binding are process-wide, initialized
/// once at startup").
pub struct CacheEngine<B: Backend> {
    core: Arc<Core<B>>,
}

impl<B: Backend> Clone for CacheEngine<B> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone() }
    }
}

impl<B: Backend> CacheEngine<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        let reverse_index = ReverseIndex::with_config(&backend, &config);
        let core = Core {
            backend,
            registry: KeyRegistry::new(),
            reverse_index,
            key_deriver: CanonicalKeyDeriver::new(),
            config,
            stats: EngineStats::new(),
        };
        Self { core: Arc::new(core) }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn backend(&self) -> &B {
        &self.core.backend
    }

    /// spec.md §4.4 `read`.
    pub async fn read<R, F, Fut>(
        &self,
        key: &str,
        params: &Params,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Outcome<R>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Outcome<R>> + Send,
    {
        let cache_key = match self.core.key_deriver.derive(key, params) {
            Ok(k) => k,
            Err(e) => return Outcome::Err(e),
        };

        match self.core.backend.get(&cache_key).await {
            Ok(Some(bytes)) => match decode::<R>(&bytes) {
                Ok(CachedValue::Single(record)) => {
                    self.core.stats.record_hit();
                    Outcome::Record(record)
                }
                Ok(CachedValue::List(list)) => {
                    self.core.stats.record_hit();
                    Outcome::List(list)
                }
                Err(e) => {
                    log::warn!("cache entry {cache_key} failed to decode: {e}; treating as miss");
                    self.core.stats.record_miss();
                    fetch().await
                }
            },
            Ok(None) => {
                self.core.stats.record_miss();
                self.populate_on_miss(&cache_key, ttl, fetch).await
            }
            Err(e) => {
                // spec.md §7: backend unavailable on the read path is logged and
                // the caller's fetch is invoked and returned uncached.
                log::warn!("backend unavailable for {cache_key}: {e}; reading through uncached");
                self.core.stats.record_miss();
                fetch().await
            }
        }
    }

    async fn populate_on_miss<R, F, Fut>(&self, cache_key: &str, ttl: Option<Duration>, fetch: F) -> Outcome<R>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Outcome<R>> + Send,
    {
        match fetch().await {
            Outcome::Record(record) => {
                if let Err(e) = self.cache_put(cache_key, &CachedValue::Single(record.clone()), ttl).await {
                    log::warn!("failed to cache {cache_key}: {e}");
                }
                if let Err(e) = self.record_instance(cache_key, &record).await {
                    log::warn!("failed to index {cache_key}: {e}");
                }
                Outcome::Record(record)
            }
            Outcome::List(list) if list.is_empty() => {
                // spec.md §4.4: an empty list is never cached; the fetch is
                // re-invoked on every call.
                Outcome::List(list)
            }
            Outcome::List(list) => {
                if let Err(e) = self.cache_put(cache_key, &CachedValue::List(list.clone()), ttl).await {
                    log::warn!("failed to cache {cache_key}: {e}");
                }
                let type_tag = list[0].type_tag();
                if let Err(e) = self.associate_list(cache_key, &list, type_tag).await {
                    log::warn!("failed to index {cache_key}: {e}");
                }
                Outcome::List(list)
            }
            Outcome::Err(e) => Outcome::Err(e),
        }
    }

    async fn cache_put<R: Serialize>(&self, cache_key: &str, value: &CachedValue<R>, ttl: Option<Duration>) -> CacheResult<()> {
        let bytes = encode(value)?;
        self.core.backend.put(cache_key, bytes, ttl).await
    }

    async fn record_instance<R: RecordIdentity>(&self, cache_key: &str, record: &R) -> CacheResult<()> {
        let id = self.core.registry.register(cache_key)?;
        self.core.reverse_index.sadd(&self.core.backend, &instance_set_key(record), id).await
    }

    async fn record_type(&self, cache_key: &str, type_tag: &str) -> CacheResult<()> {
        let id = self.core.registry.register(cache_key)?;
        self.core.reverse_index.sadd(&self.core.backend, &type_set_key(type_tag), id).await
    }

    async fn associate_list<R: RecordIdentity + Sync>(&self, cache_key: &str, list: &[R], type_tag: &str) -> CacheResult<()> {
        if list.len() > self.core.config.parallel_fanout_threshold {
            let limit = self.core.config.max_concurrent_backend_calls;
            let errors: Vec<Error> = stream::iter(list)
                .map(|record| self.record_instance(cache_key, record))
                .buffer_unordered(limit)
                .filter_map(|r| async move { r.err() })
                .collect()
                .await;
            if let Some(e) = errors.into_iter().next() {
                log::warn!("partial failure associating {cache_key}: {e}");
            }
        } else {
            for record in list {
                self.record_instance(cache_key, record).await?;
            }
        }
        self.record_type(cache_key, type_tag).await
    }

    /// spec.md §4.4 `create`.
    pub async fn create<R, F, Fut>(&self, do_fn: F) -> Outcome<R>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Outcome<R>> + Send,
    {
        let outcome = do_fn().await;
        if let Outcome::Record(record) = &outcome {
            if let Err(e) = self.flush_new(record).await {
                log::warn!("flush_new failed for type {}: {e}", record.type_tag());
            }
        }
        outcome
    }

    /// spec.md §4.4 `update`.
    pub async fn update<R, F, Fut>(&self, do_fn: F, strategy: UpdateStrategy, ttl: Option<Duration>) -> Outcome<R>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Outcome<R>> + Send,
    {
        let outcome = do_fn().await;
        if let Outcome::Record(record) = &outcome {
            let result = match strategy {
                UpdateStrategy::Evict => self.flush(record).await,
                UpdateStrategy::WriteThrough => self.direct_write_through(record, ttl).await,
            };
            if let Err(e) = result {
                log::warn!("update {:?} failed for {}: {e}", strategy, record.type_tag());
            }
        }
        outcome
    }

    /// spec.md §4.4 `delete`.
    pub async fn delete<R, F, Fut>(&self, do_fn: F) -> Outcome<R>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Outcome<R>> + Send,
    {
        let outcome = do_fn().await;
        if let Outcome::Record(record) = &outcome {
            if let Err(e) = self.flush(record).await {
                log::warn!("flush failed for {}: {e}", record.type_tag());
            }
        }
        outcome
    }

    /// spec.md §4.4 `flush`: evict every cache entry that contains `record`.
    pub async fn flush(&self, record: &(impl RecordIdentity + Sync)) -> CacheResult<()> {
        self.flush_set(&instance_set_key(record)).await
    }

    /// spec.md §4.4 `flush_new`: as `flush`, but keyed on the type set
    /// rather than the instance set, evicting every cached collection of
    /// that type.
    pub async fn flush_new(&self, record: &(impl RecordIdentity + Sync)) -> CacheResult<()> {
        self.flush_set(&type_set_key(record.type_tag())).await
    }

    async fn flush_set(&self, set_key: &str) -> CacheResult<()> {
        let ids = self.core.reverse_index.smembers(&self.core.backend, set_key).await?.unwrap_or_default();
        if ids.is_empty() {
            return Ok(());
        }

        let resolved = self.core.registry.resolve(&ids);
        let resolved_ids: std::collections::HashSet<u64> = resolved.iter().map(|(id, _)| *id).collect();
        for &id in &ids {
            if !resolved_ids.contains(&id) {
                self.core.reverse_index.srem(&self.core.backend, set_key, id).await?;
            }
        }
        if resolved.is_empty() {
            return Ok(());
        }

        let cache_keys: Vec<String> = resolved.iter().map(|(_, key)| key.clone()).collect();
        let values = match self.core.backend.multi_get(&cache_keys).await {
            Ok(values) => values,
            Err(e) => {
                // spec.md §7: multi-get failure during flush is logged; the
                // operation returns ok without mutating, correctness is
                // preserved because the next mutation will retry.
                log::warn!("multi_get failed during flush of {set_key}: {e}");
                return Ok(());
            }
        };

        let limit = self.core.config.max_concurrent_backend_calls;
        stream::iter(resolved.into_iter().zip(values))
            .for_each_concurrent(limit, |((id, cache_key), value)| async move {
                let result: CacheResult<()> = async {
                    match value {
                        None => {
                            self.core.reverse_index.srem(&self.core.backend, set_key, id).await?;
                            self.core.registry.unregister_id(id);
                        }
                        Some(_) => {
                            self.core.backend.delete(&cache_key).await?;
                            self.core.reverse_index.srem(&self.core.backend, set_key, id).await?;
                            self.core.registry.unregister_id(id);
                            self.core.stats.record_eviction();
                        }
                    }
                    Ok(())
                }
                .await;
                if let Err(e) = result {
                    log::warn!("failed to evict {cache_key} (id {id}) from {set_key}: {e}");
                }
            })
            .await;

        Ok(())
    }

    /// spec.md §4.4 `direct_write_through`: overwrite every cache entry that
    /// contains `record`, in place.
    pub async fn direct_write_through<R>(&self, record: &R, ttl: Option<Duration>) -> CacheResult<()>
    where
        R: RecordIdentity + Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        let set_key = instance_set_key(record);
        let ids = self.core.reverse_index.smembers(&self.core.backend, &set_key).await?.unwrap_or_default();
        if ids.is_empty() {
            return Ok(());
        }

        let resolved = self.core.registry.resolve(&ids);
        let resolved_ids: std::collections::HashSet<u64> = resolved.iter().map(|(id, _)| *id).collect();
        for &id in &ids {
            if !resolved_ids.contains(&id) {
                self.core.reverse_index.srem(&self.core.backend, &set_key, id).await?;
            }
        }
        if resolved.is_empty() {
            return Ok(());
        }

        let cache_keys: Vec<String> = resolved.iter().map(|(_, key)| key.clone()).collect();
        let values = match self.core.backend.multi_get(&cache_keys).await {
            Ok(values) => values,
            Err(e) => {
                log::warn!("multi_get failed during direct_write_through of {set_key}: {e}");
                return Ok(());
            }
        };

        let limit = self.core.config.max_concurrent_backend_calls;
        stream::iter(resolved.into_iter().zip(values))
            .for_each_concurrent(limit, |((id, cache_key), value)| async move {
                let Some(bytes) = value else {
                    // stale reference, same cleanup as flush.
                    if let Err(e) = self.core.reverse_index.srem(&self.core.backend, &set_key, id).await {
                        log::warn!("failed to clean up stale member {id} of {set_key}: {e}");
                    }
                    self.core.registry.unregister_id(id);
                    return;
                };

                let result: CacheResult<()> = async {
                    match decode::<R>(&bytes)? {
                        CachedValue::Single(_) => {
                            self.cache_put(&cache_key, &CachedValue::Single(record.clone()), ttl).await?;
                            self.core.stats.record_write_through();
                        }
                        CachedValue::List(mut list) => {
                            let pk = record.primary_key();
                            if let Some(pos) = list.iter().position(|e| e.primary_key() == pk) {
                                list[pos] = record.clone();
                                self.cache_put(&cache_key, &CachedValue::List(list), ttl).await?;
                                self.core.stats.record_write_through();
                            }
                            // no matching element: spec.md §4.4 leaves the
                            // entry untouched.
                        }
                    }
                    Ok(())
                }
                .await;
                if let Err(e) = result {
                    log::warn!("direct_write_through failed for {cache_key}: {e}");
                }
            })
            .await;

        Ok(())
    }
}
