use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::{CacheKey, CacheStore, StoredEntry};

type MemoryCache<V> = moka::future::Cache<CacheKey, StoredEntry<V>>;

/// An in-memory store backed by a bounded `moka` cache.
///
/// Expiry is enforced twice over: lazily at read time through
/// [`StoredEntry::is_expired`], and eagerly by moka's per-entry expiration
/// policy, which evicts entries once their TTL has passed. The eviction is an
/// optimization that bounds memory, it does not change observable behavior.
pub struct InMemoryStore<V> {
    cache: MemoryCache<V>,
}

/// A struct implementing [`moka::Expiry`] that uses the TTL stored in each
/// [`StoredEntry`] as the explicit expiration time.
struct EntryExpiration;

impl<V> moka::Expiry<CacheKey, StoredEntry<V>> for EntryExpiration {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &StoredEntry<V>,
        _current_time: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &StoredEntry<V>,
        _current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

impl<V> InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a store holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        let cache = MemoryCache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiration)
            .build();

        Self { cache }
    }
}

#[async_trait]
impl<V> CacheStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry<V>>, StoreError> {
        Ok(self
            .cache
            .get(key)
            .await
            .filter(|entry| !entry.is_expired()))
    }

    async fn set(&self, key: &CacheKey, value: V, ttl: Duration) -> Result<(), StoreError> {
        self.cache
            .insert(key.clone(), StoredEntry::new(value, ttl))
            .await;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = InMemoryStore::new(1024);
        let key = CacheKey::for_testing("roundtrip");

        assert!(store.get(&key).await.unwrap().is_none());

        store.set(&key, 5u32, Duration::from_secs(60)).await.unwrap();
        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.value, 5);
        assert_eq!(entry.ttl, Duration::from_secs(60));

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry() {
        let store = InMemoryStore::new(1024);
        let key = CacheKey::for_testing("expiry");

        store.set(&key, 5u32, Duration::from_millis(50)).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        sleep(Duration::from_millis(100)).await;
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_restarts_ttl() {
        let store = InMemoryStore::new(1024);
        let key = CacheKey::for_testing("overwrite");

        store.set(&key, 1u32, Duration::from_millis(50)).await.unwrap();
        sleep(Duration::from_millis(30)).await;

        store.set(&key, 2u32, Duration::from_millis(50)).await.unwrap();
        sleep(Duration::from_millis(30)).await;

        // 60ms after the first write, but only 30ms after the second
        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.value, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let store: InMemoryStore<u32> = InMemoryStore::new(1024);
        let key = CacheKey::for_testing("missing");

        store.delete(&key).await.unwrap();
    }
}
