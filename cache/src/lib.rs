//! `smkes` implements the Schema Mutation Key Eviction Strategy: a cache
//! layer sitting in front of a pluggable key-value backend that keeps a
//! reverse index from record identity to the cache keys whose values
//! embed that record, so a mutation to one record can evict or
//! write-through every cache entry touched by it without a full flush.
//!
//! ## Getting started
//!
//! ```rust
//! use smkes::backend::memory::MemoryBackend;
//! use smkes::engine::{CacheEngine, Outcome};
//! use smkes::record::{RecordIdentity, ScalarValue};
//!
//! #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl RecordIdentity for User {
//!     fn type_tag(&self) -> &'static str {
//!         "user"
//!     }
//!
//!     fn primary_key(&self) -> Vec<ScalarValue> {
//!         vec![self.id.into()]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = CacheEngine::new(MemoryBackend::new());
//!
//!     let params = Default::default();
//!     let outcome = engine
//!         .read("find_user", &params, None, || async {
//!             Outcome::Record(User { id: 5, name: "ada".to_string() })
//!         })
//!         .await;
//!
//!     if let Outcome::Record(user) = outcome {
//!         println!("loaded {}", user.name);
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod record;
pub mod registry;
pub mod reverse_index;
pub mod set_lock;
pub mod stats;

pub use engine::{CacheEngine, Outcome, UpdateStrategy};
pub use error::{CacheResult, Error};
pub use record::{RecordIdentity, ScalarValue};
