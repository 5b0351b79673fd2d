//! Per-key mutual exclusion.
//!
//! Concurrent callers presenting the same key run one at a time. A waiter is
//! woken when the current holder releases the key and then competes for it
//! afresh; results are never shared between holders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Notify;

type HeldKeys = Arc<Mutex<HashMap<String, Arc<Notify>>>>;

/// Set of named async locks created on demand.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    held: HeldKeys,
}

/// Releases its key on drop, including on error paths and cancellation.
pub struct KeyGuard {
    held: HeldKeys,
    key: String,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `key` is free, then hold it until the guard is dropped.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        loop {
            let notify;
            let mut notified = {
                let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
                match held.get(key) {
                    Some(existing) => notify = Arc::clone(existing),
                    None => {
                        held.insert(key.to_string(), Arc::new(Notify::new()));
                        return KeyGuard {
                            held: Arc::clone(&self.held),
                            key: key.to_string(),
                        };
                    }
                }
                // Register before the map lock is released so a release in
                // between cannot be missed.
                let mut notified = Box::pin(notify.notified());
                notified.as_mut().enable();
                notified
            };
            notified.as_mut().await;
        }
    }

    /// Whether someone currently holds `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let released = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        if let Some(notify) = released {
            notify.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_never_runs_concurrently() {
        let locks = KeyedLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = locks.acquire("tt1").await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(!locks.is_held("tt1"));
    }

    #[tokio::test]
    async fn test_different_keys_run_concurrently() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_is_held_follows_guard() {
        let locks = KeyedLocks::new();
        assert!(!locks.is_held("k"));

        let guard = locks.acquire("k").await;
        assert!(locks.is_held("k"));
        assert!(!locks.is_held("other"));

        drop(guard);
        assert!(!locks.is_held("k"));
    }

    #[tokio::test]
    async fn test_key_released_on_error() {
        async fn fails(locks: &KeyedLocks) -> Result<(), &'static str> {
            let _guard = locks.acquire("k").await;
            Err("boom")
        }

        let locks = KeyedLocks::new();
        assert!(fails(&locks).await.is_err());
        assert!(!locks.is_held("k"));
    }

    #[tokio::test]
    async fn test_key_released_on_panic() {
        let locks = KeyedLocks::new();
        let task_locks = locks.clone();
        let task = tokio::spawn(async move {
            let _guard = task_locks.acquire("k").await;
            panic!("body failed");
        });
        assert!(task.await.is_err());
        assert!(!locks.is_held("k"));
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let locks = KeyedLocks::new();
        let guard = locks.acquire("k").await;

        let waiter_locks = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = waiter_locks.acquire("k").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }
}
