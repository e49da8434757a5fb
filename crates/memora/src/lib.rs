//! # Memora caching core
//!
//! Memora avoids repeating expensive parametrized computations: a caller asks
//! for the value belonging to a set of parameters, and the cache either serves
//! a stored copy or runs the computation once and stores the result for a
//! caller-chosen time-to-live.
//!
//! ## Layers
//!
//! A request to [`Cacher::compute_memoized`] goes through the following steps:
//!
//! - The parameter set is serialized into a canonical, order-independent form
//!   and hashed into a [`CacheKey`].
//! - The key is looked up in the configured [`CacheStore`]. A fresh entry is
//!   returned directly and the computation is never run.
//! - On a miss, the computation is registered with the per-key single-flight
//!   map. Concurrent callers for the same key share one execution and all
//!   receive its outcome, value and error alike.
//! - A successful result is written back to the store with the requested TTL
//!   and returned.
//!
//! ## [`CacheContents`] / [`CacheError`]
//!
//! The caching layer deals with [`CacheContents`]s, an alias for a [`Result`]
//! around a [`CacheError`]. [`CacheError`] is cheap to clone so that a single
//! computation outcome can be handed to every caller waiting on it.
//!
//! Backend problems are not part of that taxonomy on purpose: a store that
//! fails to read degrades to a miss, and a store that fails to write still
//! lets the computed value reach the caller. Both are reported through
//! `tracing` and never surface as errors of the overall operation.
//!
//! ## Stores
//!
//! [`CacheStore`] is the pluggable backend interface. Two implementations are
//! provided: a bounded in-memory store ([`InMemoryStore`]) and a filesystem
//! store ([`FilesystemStore`]) that persists entries below a root directory.
//! Entries expire strictly: once their TTL has elapsed they are never
//! returned as hits, with no background refresh.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use memora::{CacheConfig, Cacher, InMemoryStore};
//!
//! # async fn example() -> memora::CacheContents<()> {
//! let store = Arc::new(InMemoryStore::new(1024));
//! let cacher: Cacher<u32> = Cacher::new(CacheConfig::default(), store);
//!
//! let params = serde_json::json!({ "op": "sum", "a": 2, "b": 3 });
//! let value = cacher
//!     .compute_memoized(&params, Duration::from_secs(60), async { Ok(2 + 3) })
//!     .await?;
//! assert_eq!(value, 5);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cacher;
mod config;
mod error;
mod key;
mod singleflight;
mod store;


pub use cacher::Cacher;
pub use config::{CacheConfig, FilesystemStoreConfig, InMemoryStoreConfig, StoreConfig};
pub use error::{CacheContents, CacheError, StoreError};
pub use key::{CacheKey, CacheKeyBuilder};
pub use singleflight::SingleFlight;
pub use store::{CacheStore, FilesystemStore, InMemoryStore, StoredEntry};
