//! Cache Store Module
//!
//! Main cache engine: a key/entry map behind a reader/writer lock, admitted
//! against a byte capacity, with a sweeper and a lazy cleaner reclaiming
//! expired entries in the background.

use std::borrow::Borrow;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{BincodeEstimator, CacheEntry, Expiration, SizeEstimator};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_lazy_cleaner, spawn_sweeper};

/// State shared between the cache handle and its background tasks.
pub(crate) type SharedState<K, V> = Arc<RwLock<CacheState<K, V>>>;

// == Cache State ==
/// Everything the lock guards: the entries and the closed flag.
#[derive(Debug)]
pub(crate) struct CacheState<K, V> {
    pub(crate) entries: HashMap<K, CacheEntry<K, V>>,
    pub(crate) closed: bool,
}

impl<K, V> CacheState<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            closed: false,
        }
    }

    /// Keys of every entry expired at the time of the call.
    pub(crate) fn expired_keys(&self) -> Vec<K> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Removes `key` if it is still present and still expired.
    ///
    /// An entry refreshed after its key was queued survives.
    pub(crate) fn remove_if_expired(&mut self, key: &K) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired() => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Removes a batch of previously collected keys, returning how many went.
    pub(crate) fn remove_expired(&mut self, keys: &[K]) -> usize {
        keys.iter()
            .filter(|key| self.remove_if_expired(key))
            .count()
    }
}

// == Sized TTL Cache ==
/// A thread-safe key/value cache bounded by an estimated byte size.
///
/// New keys are only admitted while the encoded size of the store leaves room
/// for them. Updates to existing keys are always accepted. Every entry carries
/// its own TTL.
///
/// The cache spawns two tokio tasks on construction, so it must be built from
/// within a tokio runtime. Call [`close`](Self::close) to stop them and drop
/// all entries; dropping the handle also stops them.
#[derive(Debug)]
pub struct SizedTtlCache<K, V, S = BincodeEstimator> {
    /// Entries and closed flag
    state: SharedState<K, V>,
    /// Measures candidate entries and the whole store
    estimator: S,
    /// Byte ceiling for admitting new keys
    capacity_bytes: usize,
    /// TTL used for `Expiration::Default`
    default_ttl: Duration,
    /// Feeds keys observed expired to the lazy cleaner
    cleanup_tx: mpsc::Sender<K>,
    /// Flipped to true once, on close or drop
    shutdown_tx: watch::Sender<bool>,
    /// Sweeper and lazy cleaner, joined on close
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<K, V> SizedTtlCache<K, V, BincodeEstimator>
where
    K: Eq + Hash + Clone + Serialize + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache sized with the bincode estimator.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_estimator(config, BincodeEstimator)
    }

    /// Creates a cache with the given capacity and default options.
    pub fn with_capacity(capacity_bytes: usize) -> Result<Self> {
        Self::new(CacheConfig::new(capacity_bytes))
    }
}

impl<K, V, S> SizedTtlCache<K, V, S>
where
    K: Eq + Hash + Clone + Serialize + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
    S: SizeEstimator,
{
    /// Creates a cache measuring entries with a custom estimator.
    ///
    /// # Errors
    /// - `CapacityNonPositive` if the capacity is zero
    /// - `DefaultExpirationNonPositive` if a zero default TTL is configured
    /// - `RuntimeUnavailable` if called outside a tokio runtime
    pub fn with_estimator(config: CacheConfig, estimator: S) -> Result<Self> {
        config.validate()?;
        Handle::try_current().map_err(|_| CacheError::RuntimeUnavailable)?;

        let state: SharedState<K, V> = Arc::new(RwLock::new(CacheState::new()));
        let (cleanup_tx, cleanup_rx) = mpsc::channel(config.effective_cleanup_queue_size());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = spawn_sweeper(
            state.clone(),
            config.effective_sweep_interval(),
            shutdown_rx.clone(),
        );
        let cleaner = spawn_lazy_cleaner(state.clone(), cleanup_rx, shutdown_rx);

        info!(
            "Cache created: capacity={} bytes, default_ttl={:?}, sweep_interval={:?}",
            config.capacity_bytes,
            config.effective_default_ttl(),
            config.effective_sweep_interval()
        );

        Ok(Self {
            state,
            estimator,
            capacity_bytes: config.capacity_bytes,
            default_ttl: config.effective_default_ttl(),
            cleanup_tx,
            shutdown_tx,
            tasks: Mutex::new(vec![sweeper, cleaner]),
        })
    }

    // == Put ==
    /// Stores a value under `key` for the given lifetime.
    ///
    /// An existing key is refreshed in place without any capacity check. A new
    /// key is rejected with `NotEnoughSpace` when its encoded size exceeds the
    /// free space. The check and the insert take the lock separately, so
    /// concurrent puts may jointly overshoot capacity.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `ttl` - `Expiration` or a `Duration`; a zero duration uses the default TTL
    pub async fn put(&self, key: K, value: V, ttl: impl Into<Expiration>) -> Result<()> {
        let ttl = ttl.into().resolve(self.default_ttl);

        // Measured before locking, a single entry does not depend on the store
        let candidate = CacheEntry::new(key, value, ttl);
        let required = match self.estimator.size_of(&candidate) {
            Ok(size) => size,
            Err(err) => {
                // A closed cache reports CacheClosed whatever the value
                if self.state.read().await.closed {
                    return Err(CacheError::CacheClosed);
                }
                return Err(err.into());
            }
        };

        {
            let state = self.state.read().await;
            if state.closed {
                return Err(CacheError::CacheClosed);
            }

            if !state.entries.contains_key(&candidate.key) {
                let available = self.free_space_of(&state)?;
                if available < to_signed(required) {
                    debug!(
                        "Rejecting new key: needs {} bytes, {} bytes free",
                        required, available
                    );
                    return Err(CacheError::NotEnoughSpace {
                        required,
                        available,
                    });
                }
            }
        }

        let mut state = self.state.write().await;
        if state.closed {
            return Err(CacheError::CacheClosed);
        }

        match state.entries.entry(candidate.key.clone()) {
            MapEntry::Occupied(mut occupied) => occupied.get_mut().update(candidate.value, ttl),
            MapEntry::Vacant(vacant) => {
                vacant.insert(candidate);
            }
        }

        Ok(())
    }

    // == Get ==
    /// Retrieves a copy of the value stored under `key`.
    ///
    /// An expired entry reads as `ElemNotFound` and its key is queued for the
    /// lazy cleaner. The removal may not have happened by the time this returns.
    pub async fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired_key = {
            let state = self.state.read().await;
            if state.closed {
                return Err(CacheError::CacheClosed);
            }

            match state.entries.get(key) {
                None => return Err(CacheError::ElemNotFound),
                Some(entry) if !entry.is_expired() => return Ok(entry.value.clone()),
                Some(entry) => entry.key.clone(),
            }
        };

        self.schedule_cleanup(expired_key).await;
        Err(CacheError::ElemNotFound)
    }

    // == Delete ==
    /// Removes `key` whether or not it has expired.
    pub async fn delete<Q>(&self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(CacheError::CacheClosed);
        }

        match state.entries.remove(key) {
            Some(_) => Ok(()),
            None => Err(CacheError::ElemNotFound),
        }
    }

    // == Exists ==
    /// Reports whether a live entry is stored under `key`.
    ///
    /// An expired entry reports `false` and is queued for the lazy cleaner.
    pub async fn exists<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let expired_key = {
            let state = self.state.read().await;
            if state.closed {
                return Err(CacheError::CacheClosed);
            }

            match state.entries.get(key) {
                None => return Ok(false),
                Some(entry) if !entry.is_expired() => return Ok(true),
                Some(entry) => entry.key.clone(),
            }
        };

        self.schedule_cleanup(expired_key).await;
        Ok(false)
    }

    // == Free Space ==
    /// Capacity minus the current encoded size of the store.
    ///
    /// Negative when updates have grown the store past its capacity.
    pub async fn free_space(&self) -> Result<i64> {
        let state = self.state.read().await;
        if state.closed {
            return Err(CacheError::CacheClosed);
        }
        self.free_space_of(&state)
    }

    // == Capacity ==
    /// Returns the fixed byte capacity.
    pub async fn cap(&self) -> Result<usize> {
        let state = self.state.read().await;
        if state.closed {
            return Err(CacheError::CacheClosed);
        }
        Ok(self.capacity_bytes)
    }

    // == Count ==
    /// Number of stored entries, including expired ones not yet reclaimed.
    pub async fn count(&self) -> Result<usize> {
        let state = self.state.read().await;
        if state.closed {
            return Err(CacheError::CacheClosed);
        }
        Ok(state.entries.len())
    }

    // == Close ==
    /// Clears the cache and stops both background tasks.
    ///
    /// Every later operation fails with `CacheClosed`. Calling it again is a no-op.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if state.closed {
                debug!("Cache already closed");
                return;
            }
            state.closed = true;
            state.entries.clear();
        }

        self.shutdown_tx.send_replace(true);

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("Background task ended abnormally: {}", err);
            }
        }

        info!("Cache closed");
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SharedState<K, V> {
        &self.state
    }

    fn free_space_of(&self, state: &CacheState<K, V>) -> Result<i64> {
        let used = self.estimator.size_of(&state.entries)?;
        Ok(to_signed(self.capacity_bytes) - to_signed(used))
    }

    /// Must be called without holding the lock; blocks while the queue is full.
    async fn schedule_cleanup(&self, key: K) {
        if self.cleanup_tx.send(key).await.is_err() {
            debug!("Lazy cleaner stopped, leaving expired key to the sweeper");
        }
    }
}

impl<K, V, S> Drop for SizedTtlCache<K, V, S> {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

fn to_signed(bytes: usize) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}
