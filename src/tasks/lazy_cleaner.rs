//! Lazy Cleanup Task
//!
//! Removes keys that `get` and `exists` observed expired, off the read path.

use std::hash::Hash;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedState;

/// Spawns the task draining the bounded queue of expired keys.
///
/// Each key is removed under the write lock if it is still present and still
/// expired. The queue is bounded, so readers wait for room when it is full.
/// The task ends on shutdown or once every sender is gone.
pub(crate) fn spawn_lazy_cleaner<K, V>(
    state: SharedState<K, V>,
    mut queue: mpsc::Receiver<K>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting lazy cleaner");

        loop {
            tokio::select! {
                key = queue.recv() => match key {
                    Some(key) => {
                        if state.write().await.remove_if_expired(&key) {
                            debug!("Lazy cleaner removed an expired entry");
                        }
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        debug!("Lazy cleaner stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheState};
    use chrono::{TimeDelta, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tokio::time::{sleep, timeout};

    fn state_with_expired(keys: std::ops::Range<u32>) -> SharedState<u32, u32> {
        let mut state = CacheState::new();
        for key in keys {
            state.entries.insert(
                key,
                CacheEntry {
                    key,
                    value: key,
                    expires_at: Some(Utc::now() - TimeDelta::seconds(1)),
                },
            );
        }
        Arc::new(RwLock::new(state))
    }

    #[tokio::test]
    async fn test_cleaner_removes_queued_key() {
        let state = state_with_expired(0..3);
        let (tx, rx) = mpsc::channel(10);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_lazy_cleaner(state.clone(), rx, shutdown_rx);

        tx.send(1).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        {
            let guard = state.read().await;
            assert_eq!(guard.entries.len(), 2);
            assert!(!guard.entries.contains_key(&1));
        }

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleaner_ignores_missing_and_refreshed_keys() {
        let state = state_with_expired(0..1);
        state
            .write()
            .await
            .entries
            .insert(5, CacheEntry::new(5, 5, None));

        let (tx, rx) = mpsc::channel(10);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_lazy_cleaner(state.clone(), rx, shutdown_rx);

        // 42 is absent, 5 is live
        tx.send(42).await.unwrap();
        tx.send(5).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let guard = state.read().await;
        assert_eq!(guard.entries.len(), 2);
        assert!(guard.entries.contains_key(&5));
    }

    #[tokio::test]
    async fn test_full_queue_blocks_sender() {
        let capacity = 2;
        let state = state_with_expired(0..5);
        let (tx, rx) = mpsc::channel(capacity);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_lazy_cleaner(state.clone(), rx, shutdown_rx);

        // Stall the cleaner on the write lock
        let guard = state.write().await;

        // The cleaner takes one key off the queue, the queue holds the rest
        for key in 0..=capacity as u32 {
            timeout(Duration::from_secs(1), tx.send(key))
                .await
                .expect("queue should have room")
                .unwrap();
        }

        let blocked = timeout(Duration::from_millis(100), tx.send(3)).await;
        assert!(blocked.is_err(), "send into a full queue should wait");

        drop(guard);
        timeout(Duration::from_secs(1), tx.send(3))
            .await
            .expect("queue should drain once the lock is released")
            .unwrap();

        drop(tx);
        handle.await.unwrap();

        let guard = state.read().await;
        assert_eq!(guard.entries.len(), 1);
        assert!(guard.entries.contains_key(&4));
    }

    #[tokio::test]
    async fn test_cleaner_stops_on_shutdown() {
        let state = state_with_expired(0..1);
        let (tx, rx) = mpsc::channel(10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_lazy_cleaner(state, rx, shutdown_rx);

        shutdown_tx.send_replace(true);

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("Cleaner should stop on shutdown")
            .unwrap();

        // Receiver is gone, sends fail instead of blocking
        assert!(tx.send(0).await.is_err());
    }
}
