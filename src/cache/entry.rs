//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

// == Expiration ==
/// Lifetime requested for an entry on `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The entry lives until explicitly deleted
    Never,
    /// Use the cache-wide default TTL
    Default,
    /// Explicit lifetime
    After(Duration),
}

impl Expiration {
    /// Resolves the sentinels against the cache default. `None` means never expires.
    pub fn resolve(self, default_ttl: Duration) -> Option<Duration> {
        match self {
            Expiration::Never => None,
            Expiration::Default => Some(default_ttl),
            Expiration::After(ttl) => Some(ttl),
        }
    }
}

/// A zero duration selects the cache default.
impl From<Duration> for Expiration {
    fn from(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Expiration::Default
        } else {
            Expiration::After(ttl)
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with key, value and expiration instant.
///
/// The serialized form is what the size estimator measures, so the expiration
/// instant is encoded as a fixed-width millisecond timestamp.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CacheEntry<K, V> {
    /// The key the entry is stored under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration instant (UTC), None = no expiration
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl` from now, or never when `ttl` is None.
    pub fn new(key: K, value: V, ttl: Option<Duration>) -> Self {
        Self {
            key,
            value,
            expires_at: expiration_instant(ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current instant strictly exceeds its
    /// expiration instant. Entries without one never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => Utc::now() > expires,
            None => false,
        }
    }

    // == Update ==
    /// Replaces the value and restarts the lifetime from now.
    pub fn update(&mut self, value: V, ttl: Option<Duration>) {
        self.value = value;
        self.expires_at = expiration_instant(ttl);
    }
}

/// A TTL too large for the calendar saturates to "never".
fn expiration_instant(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = TimeDelta::from_std(ttl?).ok()?;
    Utc::now().checked_add_signed(ttl)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("key", "test_value".to_string(), None);

        assert_eq!(entry.key, "key");
        assert_eq!(entry.value, "test_value");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let before = Utc::now();
        let entry = CacheEntry::new("key", 7u64, Some(Duration::from_secs(60)));

        let expires = entry.expires_at.unwrap();
        assert!(expires >= before + TimeDelta::seconds(60));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(1, 1, Some(Duration::from_millis(50)));

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_update_refreshes_value_and_expiration() {
        let mut entry = CacheEntry::new(1, "old", Some(Duration::from_millis(20)));
        sleep(Duration::from_millis(40));
        assert!(entry.is_expired());

        entry.update("new", Some(Duration::from_secs(60)));

        assert_eq!(entry.value, "new");
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_update_to_no_expiration() {
        let mut entry = CacheEntry::new(1, 1, Some(Duration::from_secs(1)));
        entry.update(2, None);

        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Utc::now();
        let entry = CacheEntry {
            key: 1,
            value: 1,
            expires_at: Some(now),
        };

        sleep(Duration::from_millis(2));
        assert!(entry.is_expired(), "Entry should be expired once past its instant");
    }

    #[test]
    fn test_huge_ttl_saturates_to_never() {
        let entry = CacheEntry::new(1, 1, Some(Duration::MAX));
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiration_from_duration() {
        assert_eq!(Expiration::from(Duration::ZERO), Expiration::Default);
        assert_eq!(
            Expiration::from(Duration::from_millis(5)),
            Expiration::After(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_expiration_resolve() {
        let default = Duration::from_secs(300);
        assert_eq!(Expiration::Never.resolve(default), None);
        assert_eq!(Expiration::Default.resolve(default), Some(default));
        assert_eq!(
            Expiration::After(Duration::from_secs(1)).resolve(default),
            Some(Duration::from_secs(1))
        );
    }
}
