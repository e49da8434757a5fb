use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CacheKey;
use crate::error::StoreError;

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::InMemoryStore;

/// A cached value together with the expiry bookkeeping it was stored with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry<V> {
    /// The cached value.
    pub value: V,
    /// When the entry was written.
    pub stored_at: SystemTime,
    /// How long the entry stays fresh after `stored_at`.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl<V> StoredEntry<V> {
    pub(crate) fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    /// Whether the entry is past its deadline.
    ///
    /// A clock that moved backwards reads as no time elapsed, which keeps the
    /// entry alive instead of expiring it spuriously.
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed().unwrap_or_default() >= self.ttl
    }
}

/// A pluggable key/value backend with TTL-aware reads.
///
/// Implementations report faithfully: absent or logically expired entries are
/// misses, anything else is returned as stored. Degrading backend errors into
/// misses is the job of the [`Cacher`](crate::Cacher), not the store.
///
/// Implementations must be safe under concurrent access; atomicity is only
/// required at single-entry granularity.
#[async_trait]
pub trait CacheStore<V>: Send + Sync {
    /// Looks up the entry stored for `key`.
    ///
    /// Returns `Ok(None)` if the key is absent or the entry is logically
    /// expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry<V>>, StoreError>;

    /// Stores `value` for `key`, replacing any previous entry with a fresh
    /// write time.
    async fn set(&self, key: &CacheKey, value: V, ttl: Duration) -> Result<(), StoreError>;

    /// Removes the entry for `key` if present; a no-op otherwise.
    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;
}
