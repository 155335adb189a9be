use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheResult, Error};

/// A caller-supplied parameter map, keyed by parameter name. Kept as
/// `serde_json::Value` so callers can pass whatever shape their call site
/// needs without this crate defining a parameter schema of its own.
pub type Params = BTreeMap<String, Value>;

/// The pure function spec.md §4.5 requires: `(key, params) -> cache_key`,
/// deterministic for logically equal `params` regardless of the caller's
/// internal ordering.
pub trait KeyDeriver: Send + Sync {
    fn derive(&self, key: &str, params: &Params) -> CacheResult<String>;
}

/// The canonical key deriver: sort parameter keys (a `BTreeMap` already
/// keeps them sorted) and JSON-encode the value, emitting `"{key}:{json}"`.
///
/// Grounded on the teacher's `JsonCodec::encode` (`kv/src/codec/json_codec.rs`):
/// `serde_json::to_string` on success, `Error::Internal`/`Error::Parse` on
/// failure, carried over here as `Error::Parse` since encoding a parameter
/// map is itself a parse-adjacent concern from the caller's perspective.
#[derive(Clone, Copy, Default)]
pub struct CanonicalKeyDeriver;

impl CanonicalKeyDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Encodes an already-typed parameter struct the same way, for callers
    /// who'd rather derive `Serialize` on a params struct than build a
    /// `Params` map by hand. The struct is round-tripped through
    /// `serde_json::Value` first so that field order in the struct
    /// definition never affects the resulting `cache_key`.
    pub fn derive_typed<T: Serialize>(&self, key: &str, params: &T) -> CacheResult<String> {
        let value = serde_json::to_value(params).map_err(|e| Error::Parse(e.to_string()))?;
        let normalized: Params = match value {
            Value::Object(map) => map.into_iter().collect(),
            Value::Null => Params::new(),
            other => {
                let mut m = Params::new();
                m.insert("_".to_string(), other);
                m
            }
        };
        self.derive(key, &normalized)
    }
}

impl KeyDeriver for CanonicalKeyDeriver {
    fn derive(&self, key: &str, params: &Params) -> CacheResult<String> {
        let json = serde_json::to_string(params).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(format!("{key}:{json}"))
    }
}
