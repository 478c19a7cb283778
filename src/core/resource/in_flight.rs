use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::core::error::ResourceResult;

/// Table of operations currently running, keyed by identity.
///
/// The first caller for a key runs its operation; callers arriving while it
/// runs wait for and share its result instead of starting a duplicate. A
/// failed operation leaves nothing behind, so the next waiter runs its own.
pub struct InFlight<T> {
    pending: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> InFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` for `key`, or join the run already in progress.
    ///
    /// Returns the value and whether this caller was the one that produced it.
    pub async fn run<F, Fut>(&self, key: &str, op: F) -> ResourceResult<(T, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ResourceResult<T>>,
    {
        let cell = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.entry(key.to_string()).or_default().clone()
        };

        let mut leader = false;
        let result = cell
            .get_or_try_init(|| {
                leader = true;
                op()
            })
            .await
            .cloned();

        if leader {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if pending.get(key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                pending.remove(key);
            }
        }

        result.map(|value| (value, leader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::core::error::ResourceError;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let table = Arc::new(InFlight::<u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let table = table.clone();
            let runs = runs.clone();
            handles.push(tokio::spawn(async move {
                table
                    .run("same", || async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let (value, leader) = handle.await.unwrap();
            assert_eq!(value, 7);
            leaders += leader as usize;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert!(table.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let table = InFlight::<&'static str>::new();
        let (a, b) = tokio::join!(
            table.run("a", || async { Ok("a") }),
            table.run("b", || async { Ok("b") }),
        );
        assert_eq!(a.unwrap(), ("a", true));
        assert_eq!(b.unwrap(), ("b", true));
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let table = InFlight::<u32>::new();
        let failed = table
            .run("k", || async { Err(ResourceError::Other("boom".into())) })
            .await;
        assert!(failed.is_err());
        assert!(table.pending.lock().unwrap().is_empty());

        let (value, leader) = table.run("k", || async { Ok(1) }).await.unwrap();
        assert_eq!((value, leader), (1, true));
    }

    #[tokio::test]
    async fn abandoned_run_does_not_block_the_key() {
        let table = InFlight::<u32>::new();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            table.run("k", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(0)
            }),
        )
        .await;
        assert!(abandoned.is_err());

        let (value, leader) = table.run("k", || async { Ok(2) }).await.unwrap();
        assert_eq!((value, leader), (2, true));
        assert!(table.pending.lock().unwrap().is_empty());
    }
}
