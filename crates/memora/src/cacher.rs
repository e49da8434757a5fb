use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::CacheConfig;
use crate::singleflight::SingleFlight;
use crate::{CacheContents, CacheError, CacheKey, CacheStore};

/// The cache facade: get a cached value, or compute and cache it.
///
/// A `Cacher` wires together key derivation, a pluggable [`CacheStore`]
/// backend and per-key single-flight coordination. Backend failures never
/// reach callers: a failed read is a miss, and a failed write still returns
/// the freshly computed value.
pub struct Cacher<V> {
    config: CacheConfig,
    store: Arc<dyn CacheStore<V>>,
    in_flight: SingleFlight<V>,
}

impl<V> fmt::Debug for Cacher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cacher")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl<V> Cacher<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new cacher on top of the given store.
    ///
    /// The store is passed in explicitly; there is no process-wide cache
    /// state.
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore<V>>) -> Self {
        Self {
            config,
            store,
            in_flight: SingleFlight::default(),
        }
    }

    /// Returns the cached value for `params`, computing and caching it on a
    /// miss.
    ///
    /// The computation is only polled when no fresh entry exists; concurrent
    /// calls for the same parameters share a single execution and all receive
    /// its outcome. Successful results are stored with the given `ttl`,
    /// failures are returned uncached.
    ///
    /// A zero `ttl` bypasses the store entirely: the value is computed (still
    /// coalesced across concurrent callers) but neither read from nor written
    /// to the backend.
    pub async fn compute_memoized<P, F>(
        &self,
        params: &P,
        ttl: Duration,
        computation: F,
    ) -> CacheContents<V>
    where
        P: Serialize,
        F: Future<Output = CacheContents<V>> + Send + 'static,
    {
        let key = CacheKey::from_params(params)?;

        if !ttl.is_zero() {
            match self.store.get(&key).await {
                Ok(Some(entry)) => return Ok(entry.value),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        error = &e as &dyn std::error::Error,
                        cache = %self.config.name,
                        key = %key,
                        "Failed to read from cache, treating as miss",
                    );
                }
            }
        }

        let store = Arc::clone(&self.store);
        let compute_timeout = self.config.compute_timeout;
        let name = self.config.name.clone();
        let store_key = key.clone();
        let computation = async move {
            let value = match compute_timeout {
                Some(limit) => match tokio::time::timeout(limit, computation).await {
                    Ok(outcome) => outcome?,
                    Err(_) => return Err(CacheError::Timeout(limit)),
                },
                None => computation.await?,
            };

            if !ttl.is_zero() {
                if let Err(e) = store.set(&store_key, value.clone(), ttl).await {
                    tracing::error!(
                        error = &e as &dyn std::error::Error,
                        cache = %name,
                        key = %store_key,
                        "Failed to write cache entry",
                    );
                }
            }

            Ok(value)
        };

        self.in_flight.run_exclusive(&key, computation).await
    }

    /// Removes the entry for `params`, forcing the next
    /// [`compute_memoized`](Self::compute_memoized) for these parameters to
    /// recompute regardless of remaining TTL.
    pub async fn invalidate<P: Serialize>(&self, params: &P) -> CacheContents<()> {
        let key = CacheKey::from_params(params)?;

        if let Err(e) = self.store.delete(&key).await {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                cache = %self.config.name,
                key = %key,
                "Failed to delete cache entry",
            );
        }
        Ok(())
    }
}
