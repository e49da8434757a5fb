use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::{CacheContents, CacheKey};

type SharedComputation<V> = Shared<BoxFuture<'static, CacheContents<V>>>;
type InFlightMap<V> = Arc<Mutex<HashMap<CacheKey, SharedComputation<V>>>>;

/// Removes a key's in-flight entry when dropped.
struct ReleaseGuard<V> {
    registry: InFlightMap<V>,
    key: CacheKey,
}

impl<V> Drop for ReleaseGuard<V> {
    fn drop(&mut self) {
        self.registry.lock().unwrap().remove(&self.key);
    }
}

/// Per-key coordination ensuring at most one in-flight computation per key.
///
/// The first caller for a key registers the computation in the in-flight map;
/// every later caller for the same key awaits that same shared future, so a
/// burst of concurrent requests produces a single execution whose outcome is
/// handed to all of them. The map entry is removed the moment the computation
/// resolves, success and failure alike, which makes the next caller for that
/// key a fresh leader.
///
/// Operations on distinct keys never wait on each other beyond the brief
/// lock on the map itself.
pub struct SingleFlight<V> {
    in_flight: InFlightMap<V>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            in_flight: Default::default(),
        }
    }
}

impl<V> fmt::Debug for SingleFlight<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_flight = self
            .in_flight
            .try_lock()
            .map(|map| map.len())
            .unwrap_or_default();
        f.debug_struct("SingleFlight")
            .field("in-flight computations", &in_flight)
            .finish()
    }
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Runs `computation` for `key`, or joins the one already in flight.
    ///
    /// A caller that arrives after the computation resolved but before its
    /// entry was drained receives the recorded outcome, a failed computation
    /// included. Abandoning every waiter does not abort the computation: the
    /// registered future stays in the map and the next caller resumes it.
    pub async fn run_exclusive<F>(&self, key: &CacheKey, computation: F) -> CacheContents<V>
    where
        F: Future<Output = CacheContents<V>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(key) {
                Some(shared) => shared.clone(),
                None => {
                    let release = ReleaseGuard {
                        registry: Arc::clone(&self.in_flight),
                        key: key.clone(),
                    };
                    let computation = async move {
                        // Dropped during the resolving poll, before any waiter
                        // observes the outcome.
                        let _release = release;
                        computation.await
                    };

                    let shared = computation.boxed().shared();
                    in_flight.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// The number of computations currently in flight.
    pub fn len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Whether any computation is currently in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time;

    use crate::CacheError;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_concurrent_callers() {
        let single_flight = SingleFlight::default();
        let key = CacheKey::for_testing("coalesce");
        let calls = Arc::new(AtomicUsize::new(0));

        let computation = || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_millis(100)).await;
                Ok(42)
            }
        };

        let res = futures::join!(
            single_flight.run_exclusive(&key, computation()),
            single_flight.run_exclusive(&key, computation()),
            single_flight.run_exclusive(&key, computation()),
        );

        assert_eq!((res.0, res.1, res.2), (Ok(42), Ok(42), Ok(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(single_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_all_waiters() {
        let single_flight: SingleFlight<u32> = SingleFlight::default();
        let key = CacheKey::for_testing("failing");
        let calls = Arc::new(AtomicUsize::new(0));

        let computation = || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_millis(10)).await;
                Err(CacheError::Compute("boom".into()))
            }
        };

        let res = futures::join!(
            single_flight.run_exclusive(&key, computation()),
            single_flight.run_exclusive(&key, computation()),
        );

        let expected = Err(CacheError::Compute("boom".into()));
        assert_eq!((res.0.clone(), res.1), (expected.clone(), expected));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // the key is released again, a new leader may retry
        let retried = single_flight
            .run_exclusive(&key, async { Ok(7) })
            .await;
        assert_eq!(retried, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(single_flight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let single_flight = SingleFlight::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let computation = |value: u32| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_millis(50)).await;
                Ok(value)
            }
        };

        let left_key = CacheKey::for_testing("left");
        let right_key = CacheKey::for_testing("right");
        let res = futures::join!(
            single_flight.run_exclusive(&left_key, computation(1)),
            single_flight.run_exclusive(&right_key, computation(2)),
        );

        assert_eq!((res.0, res.1), (Ok(1), Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(single_flight.is_empty());
    }
}
