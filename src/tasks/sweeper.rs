//! Expiration Sweeper Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::cache::SharedState;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// Each sweep collects expired keys under the read lock, then removes the
/// whole batch under one write lock. Entries refreshed in between are kept.
/// The task ends when `shutdown` changes or its sender is dropped.
///
/// # Arguments
/// * `state` - State shared with the cache handle
/// * `interval` - Time between two sweeps, must be non-zero
/// * `shutdown` - Receiver flipped once by close or drop
pub(crate) fn spawn_sweeper<K, V>(
    state: SharedState<K, V>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiration sweeper with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sweep(&state).await;
                    if removed > 0 {
                        info!("Sweep: removed {} expired entries", removed);
                    } else {
                        debug!("Sweep: no expired entries found");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("Expiration sweeper stopped");
    })
}

/// Runs one sweep and returns the number of entries removed.
pub(crate) async fn sweep<K, V>(state: &SharedState<K, V>) -> usize
where
    K: Eq + Hash + Clone,
{
    let expired = state.read().await.expired_keys();
    if expired.is_empty() {
        return 0;
    }

    state.write().await.remove_expired(&expired)
}
