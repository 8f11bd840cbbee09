//! Sized TTL Cache - An in-process key/value cache
//!
//! Entries are admitted against a byte capacity and expire after a per-entry
//! TTL. Expired entries are reclaimed by a periodic sweeper and by a lazy
//! cleaner fed from the read path.

pub mod cache;
pub mod config;
pub mod error;
pub(crate) mod tasks;

pub use cache::{Expiration, SizedTtlCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
