//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::cache::SizeError;

// == Cache Error Enum ==
/// Unified error type for every cache operation.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Configured capacity is zero
    #[error("cache capacity in bytes must be greater than zero")]
    CapacityNonPositive,

    /// Configured default TTL is zero
    #[error("default expiration must be greater than zero")]
    DefaultExpirationNonPositive,

    /// Key is absent, or was observed expired
    #[error("element not found")]
    ElemNotFound,

    /// Admitting a new key would exceed capacity
    #[error("not enough space: entry needs {required} bytes, {available} bytes free")]
    NotEnoughSpace { required: usize, available: i64 },

    /// Operation invoked after close
    #[error("cache is closed")]
    CacheClosed,

    /// Cache constructed outside a tokio runtime
    #[error("cache must be created from within a tokio runtime")]
    RuntimeUnavailable,

    /// Size estimation could not encode the data
    #[error("size estimation failed: {0}")]
    Serialization(#[from] SizeError),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
