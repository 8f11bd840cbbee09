//! Cache Module
//!
//! Provides an in-memory cache bounded by byte capacity with TTL expiration.

mod entry;
mod size;
mod store;


// Re-export public types
pub use entry::Expiration;
pub use size::{BincodeEstimator, JsonEstimator, SizeError, SizeEstimator};
pub use store::SizedTtlCache;

pub(crate) use entry::CacheEntry;
pub(crate) use store::SharedState;
#[cfg(test)]
pub(crate) use store::CacheState;
