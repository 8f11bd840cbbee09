//! Configuration Module
//!
//! Cache construction options, with fixed defaults for everything but capacity.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::error::{CacheError, Result};

/// TTL applied to entries stored with `Expiration::Default` when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Period between two sweeps of expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(300);

/// Number of expired keys the lazy cleaner can have pending.
pub const DEFAULT_CLEANUP_QUEUE_SIZE: usize = 10;

/// Capacity used by `Default` and by `from_env` when `CACHE_CAPACITY_BYTES` is unset.
pub const DEFAULT_CAPACITY_BYTES: usize = 1024 * 1024;

/// Cache configuration parameters.
///
/// Only `capacity_bytes` is required. Unset options fall back to the
/// `DEFAULT_*` constants of this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Byte ceiling checked when admitting new keys
    pub capacity_bytes: usize,
    /// TTL used for entries stored with `Expiration::Default`
    pub default_ttl: Option<Duration>,
    /// Interval between two sweeps
    pub sweep_interval: Option<Duration>,
    /// Bound of the lazy cleanup queue
    pub cleanup_queue_size: Option<usize>,
}

impl CacheConfig {
    /// Creates a config with the given capacity and every other option unset.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            default_ttl: None,
            sweep_interval: None,
            cleanup_queue_size: None,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    pub fn with_cleanup_queue_size(mut self, size: usize) -> Self {
        self.cleanup_queue_size = Some(size);
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY_BYTES` - Byte capacity (default: 1 MiB)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: unset)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: unset)
    /// - `CACHE_CLEANUP_QUEUE_SIZE` - Lazy cleanup queue bound (default: unset)
    pub fn from_env() -> Self {
        Self {
            capacity_bytes: env_parse("CACHE_CAPACITY_BYTES").unwrap_or(DEFAULT_CAPACITY_BYTES),
            default_ttl: env_parse("CACHE_DEFAULT_TTL_MS").map(Duration::from_millis),
            sweep_interval: env_parse("CACHE_SWEEP_INTERVAL_MS").map(Duration::from_millis),
            cleanup_queue_size: env_parse("CACHE_CLEANUP_QUEUE_SIZE"),
        }
    }

    /// Checks the construction contract.
    pub fn validate(&self) -> Result<()> {
        if self.capacity_bytes == 0 {
            return Err(CacheError::CapacityNonPositive);
        }
        if self.default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::DefaultExpirationNonPositive);
        }
        Ok(())
    }

    pub fn effective_default_ttl(&self) -> Duration {
        self.default_ttl.unwrap_or(DEFAULT_TTL)
    }

    /// A zero interval cannot drive a timer, so it falls back to the default.
    pub fn effective_sweep_interval(&self) -> Duration {
        match self.sweep_interval {
            Some(interval) if interval.is_zero() => {
                warn!("Zero sweep interval requested, using {:?}", DEFAULT_SWEEP_INTERVAL);
                DEFAULT_SWEEP_INTERVAL
            }
            Some(interval) => interval,
            None => DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// A zero-sized queue cannot be created, so it falls back to the default.
    pub fn effective_cleanup_queue_size(&self) -> usize {
        match self.cleanup_queue_size {
            Some(0) => {
                warn!(
                    "Zero cleanup queue size requested, using {}",
                    DEFAULT_CLEANUP_QUEUE_SIZE
                );
                DEFAULT_CLEANUP_QUEUE_SIZE
            }
            Some(size) => size,
            None => DEFAULT_CLEANUP_QUEUE_SIZE,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_BYTES)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
