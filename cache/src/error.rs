use std::fmt;

/// Result alias used throughout this crate, mirroring the teacher's `CResult<T>`.
pub type CacheResult<T> = Result<T, Error>;

/// Errors surfaced by the cache engine, the backend adapter dispatch layer,
/// and the Set Lock fallback.
///
/// The cache is advisory (spec.md §7): a backend failure on the read path or
/// during `flush`'s `multi_get` is logged and handled inline, it never
/// reaches the caller as one of these variants. Only failures that must
/// abort the current operation — a lock timeout, a malformed stored value,
/// an adapter returning an error on a write the engine can't route around —
/// become an `Error`.
#[derive(Debug)]
pub enum Error {
    /// The backend adapter returned an error for a write-path operation
    /// (`put`, `delete`, `set-add`, `set-remove`) that the engine cannot
    /// treat as advisory.
    Backend(String),

    /// A stored cache value could not be decoded into the requested record
    /// shape, or a record could not be encoded for storage.
    Value(String),

    /// An error internal to this crate (e.g. a capability invariant was
    /// violated) rather than one that originated in the backend.
    Internal(String),

    /// JSON encoding/decoding of a cache key or a cache value failed.
    Parse(String),

    /// A Set Lock partition could not be acquired within the configured
    /// retry budget (spec.md §4.3). Never retried internally beyond that
    /// budget.
    LockTimeout { set_key: String, attempts: u32 },

    /// The key registry's 64-bit identifier space was exhausted. Spec.md
    /// §4.1/§7 call this unreachable in practice; kept as a named variant
    /// rather than a panic so the impossible case still type-checks as
    /// recoverable.
    RegistryExhausted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Backend(msg) => write!(f, "backend error: {msg}"),
            Error::Value(msg) => write!(f, "invalid cache value: {msg}"),
            Error::Internal(msg) => write!(f, "internal error: {msg}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::LockTimeout { set_key, attempts } => write!(
                f,
                "lock timeout acquiring partition for set {set_key:?} after {attempts} attempts"
            ),
            Error::RegistryExhausted => write!(f, "key registry identifier space exhausted"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
