//! Per-key coalescing of concurrent identical requests
//!
//! Two callers asking for the same thing at the same time should produce
//! one underlying call, with both observing its result. The orchestrator
//! uses this to guarantee at most one in-flight status poll (or result
//! fetch) per job id.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use prismflow_domain::Result;

type SharedCall<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Entry<T> {
    generation: u64,
    call: SharedCall<T>,
}

/// Coalesces concurrent calls per key into one shared future.
pub struct SingleFlight<K, T> {
    inflight: Mutex<HashMap<K, Entry<T>>>,
    next_generation: Mutex<u64>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
            next_generation: Mutex::new(0),
        }
    }

    /// Number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.lock_inflight().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `make` for `key`, unless a call for that key is already in
    /// flight, in which case the existing call's result is awaited instead.
    ///
    /// The future produced by `make` must be `'static`: it is shared among
    /// every coalesced waiter.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (generation, call) = {
            let mut inflight = self.lock_inflight();
            if let Some(entry) = inflight.get(&key) {
                debug!(key = ?key, "coalescing onto in-flight call");
                (entry.generation, entry.call.clone())
            } else {
                let generation = {
                    let mut next = match self.next_generation.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    *next += 1;
                    *next
                };
                let call: SharedCall<T> = make().boxed().shared();
                inflight.insert(
                    key.clone(),
                    Entry {
                        generation,
                        call: call.clone(),
                    },
                );
                (generation, call)
            }
        };

        let result = call.await;

        // Every waiter tries to clean up; only the entry for this exact
        // call generation is removed, so a newer call is never evicted.
        let mut inflight = self.lock_inflight();
        if inflight
            .get(&key)
            .map_or(false, |entry| entry.generation == generation)
        {
            inflight.remove(&key);
        }

        result
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<K, Entry<T>>> {
        match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("single-flight map lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for request coalescing.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use prismflow_domain::PrismError;

    /// Tests concurrent callers for the same key share one underlying call.
    #[tokio::test]
    async fn test_concurrent_calls_coalesce() {
        let flight: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .run("job-1".to_string(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.expect("join").expect("call"), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1, "one underlying call");
        assert!(flight.is_empty(), "entry cleaned up after completion");
    }

    /// Tests different keys do not coalesce.
    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let flight: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicU32::new(0));

        let a = {
            let calls = Arc::clone(&calls);
            flight.run("a".to_string(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
        };
        let b = {
            let calls = Arc::clone(&calls);
            flight.run("b".to_string(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a.expect("a"), 1);
        assert_eq!(b.expect("b"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Tests every coalesced waiter observes the same failure.
    #[tokio::test]
    async fn test_waiters_share_failure() {
        let flight: Arc<SingleFlight<String, u32>> = Arc::new(SingleFlight::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let flight = Arc::clone(&flight);
            handles.push(tokio::spawn(async move {
                flight
                    .run("job-1".to_string(), || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(PrismError::network("poll failed"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let result = handle.await.expect("join");
            assert!(matches!(result, Err(PrismError::Network { .. })));
        }
    }

    /// Tests a call issued after completion runs fresh instead of reusing a
    /// stale result.
    #[tokio::test]
    async fn test_sequential_calls_run_fresh() {
        let flight: SingleFlight<String, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicU32::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let value = flight
                .run("job-1".to_string(), move || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
                })
                .await
                .expect("call");
            assert_eq!(value, expected);
        }
    }
}
