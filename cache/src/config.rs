//! Engine configuration (spec.md §6: "Configuration consists of: the
//! adapter instance, the parallel-fanout threshold, the lock-partition
//! multiplier, and the lock retry budget").
//!
//! Modeled on the teacher's `ConfigLoad` (`kv-cli/src/config.rs`) — a plain
//! struct with a `Default` impl — but scoped to the numeric knobs this
//! library actually owns. There is no config-file loading here: spec.md §9
//! is explicit that there is "no global `init` that consults environment
//! variables," and with no CLI crate in this workspace there is nowhere for
//! a config file path to come from.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Above this many elements, association of a fetched list with its
    /// cache key's instance/type index sets is performed with bounded
    /// parallel fanout instead of sequentially (spec.md §4.4).
    pub parallel_fanout_threshold: usize,

    /// `P = available_parallelism() * lock_partition_multiplier` partitions
    /// in the Set Lock fallback table (spec.md §4.3).
    pub lock_partition_multiplier: usize,

    /// Bounded retry budget for acquiring a Set Lock partition before
    /// failing with a lock-timeout error (spec.md §4.3).
    pub lock_retry_attempts: u32,
    pub lock_retry_backoff: Duration,

    /// Upper bound on concurrent in-flight backend calls during a large
    /// `flush`/`direct_write_through` fanout over `live` membership
    /// (spec.md §4.4: "Large `live` sets are processed with bounded
    /// parallelism").
    pub max_concurrent_backend_calls: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_fanout_threshold: 100,
            lock_partition_multiplier: 4,
            lock_retry_attempts: 100,
            lock_retry_backoff: Duration::from_millis(1),
            max_concurrent_backend_calls: 32,
        }
    }
}
