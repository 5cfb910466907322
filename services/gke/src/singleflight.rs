use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use fedtoken_core::{Error, Result};

type Flight<T> = Arc<OnceCell<std::result::Result<T, Arc<Error>>>>;

/// Group collapses concurrent calls for one key into a single in-flight
/// operation.
///
/// While a call for a key is in flight, joiners await the same shared cell
/// and observe the identical outcome without invoking their own closure.
/// Once resolved, the key is released and the next call runs anew; this is
/// request collapsing, not a cache.
///
/// A caller that stops awaiting only detaches itself. If the caller
/// driving the operation is cancelled mid-flight, one of the remaining
/// waiters takes over initialization, so the rest still resolve.
#[derive(Debug)]
pub(crate) struct Group<T> {
    flights: Mutex<HashMap<String, Flight<T>>>,
}

impl<T> Default for Group<T> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> Group<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let flight = {
            let mut flights = self.flights.lock().expect("lock poisoned");
            flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = flight
            .get_or_init(|| async { f().await.map_err(Arc::new) })
            .await
            .clone();

        // Release the key so a later call starts a fresh flight. Joiners
        // still holding the old cell are unaffected.
        {
            let mut flights = self.flights.lock().expect("lock poisoned");
            if let Some(current) = flights.get(key) {
                if Arc::ptr_eq(current, &flight) {
                    flights.remove(key);
                }
            }
        }

        result.map_err(|e| Error::new(e.kind(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_calls_share_one_flight() {
        let group = Arc::new(Group::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let group = group.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                group
                    .run("flytesnacks/default", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("token".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_is_shared_with_joiners() {
        let group = Arc::new(Group::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let group = group.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                group
                    .run("flytesnacks/default", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(Error::exchange_client("HTTP status 401"))
                    })
                    .await
            }));
        }

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert_eq!(err.kind(), fedtoken_core::ErrorKind::ExchangeClient);
            assert_eq!(err.to_string(), "HTTP status 401");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let group = Arc::new(Group::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let lhs = {
            let group = group.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                group
                    .run("a/default", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("a-token".to_string())
                    })
                    .await
            })
        };
        let rhs = {
            let group = group.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                group
                    .run("b/default", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(Error::exchange_transient("network down"))
                    })
                    .await
            })
        };

        assert_eq!(lhs.await.unwrap().unwrap(), "a-token");
        assert!(rhs.await.unwrap().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_key_is_released_after_completion() {
        let group = Group::new();

        let first = group.run("k", || async { Ok(1) }).await.unwrap();
        let second = group.run("k", || async { Ok(2) }).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }
}
