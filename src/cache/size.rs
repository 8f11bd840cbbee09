//! Size Estimation Module
//!
//! Turns an entry, or the whole entry map, into a byte count by encoding it.
//! Both are measured with the same encoder so they compare on one scale.
//!
//! The whole-store size is re-derived on every capacity check. An estimator
//! that keeps a running total could replace these without touching the store.

use serde::Serialize;
use thiserror::Error;

// == Size Error ==
/// Raised when a value cannot be encoded.
#[derive(Error, Debug)]
pub enum SizeError {
    #[error("bincode encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

// == Size Estimator ==
/// Measures the encoded size of serializable data.
pub trait SizeEstimator: Send + Sync + 'static {
    /// Returns the encoded length of `value` in bytes.
    fn size_of<T>(&self, value: &T) -> Result<usize, SizeError>
    where
        T: Serialize + ?Sized;
}

/// Default estimator: length of the bincode encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeEstimator;

impl SizeEstimator for BincodeEstimator {
    fn size_of<T>(&self, value: &T) -> Result<usize, SizeError>
    where
        T: Serialize + ?Sized,
    {
        // serialized_size walks the value without allocating the buffer
        let size = bincode::serialized_size(value)?;
        Ok(usize::try_from(size).unwrap_or(usize::MAX))
    }
}

/// Length of the JSON encoding.
///
/// Maps are only encodable when their keys are strings or integers, so caches
/// keyed by other types fail on `put` with this estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEstimator;

impl SizeEstimator for JsonEstimator {
    fn size_of<T>(&self, value: &T) -> Result<usize, SizeError>
    where
        T: Serialize + ?Sized,
    {
        Ok(serde_json::to_vec(value)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use serde::Serializer;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("value refuses to be encoded"))
        }
    }

    #[test]
    fn test_bincode_size_of_primitives() {
        let estimator = BincodeEstimator;
        assert_eq!(estimator.size_of(&1u64).unwrap(), 8);
        assert_eq!(estimator.size_of(&1u8).unwrap(), 1);
        // u64 length prefix plus the bytes
        assert_eq!(estimator.size_of("abc").unwrap(), 11);
    }

    #[test]
    fn test_bincode_entry_size() {
        let estimator = BincodeEstimator;
        let immortal = CacheEntry::new(1u32, 1u64, None);
        let mortal = CacheEntry::new(1u32, 1u64, Some(Duration::from_secs(1)));

        // key + value + option tag, plus an i64 timestamp when set
        assert_eq!(estimator.size_of(&immortal).unwrap(), 4 + 8 + 1);
        assert_eq!(estimator.size_of(&mortal).unwrap(), 4 + 8 + 1 + 8);
    }

    #[test]
    fn test_map_size_sums_entries() {
        let estimator = BincodeEstimator;
        let mut entries = HashMap::new();
        let empty = estimator.size_of(&entries).unwrap();

        let entry = CacheEntry::new(7u32, 70u64, None);
        let entry_size = estimator.size_of(&entry).unwrap();
        entries.insert(7u32, entry);

        let key_size = estimator.size_of(&7u32).unwrap();
        assert_eq!(estimator.size_of(&entries).unwrap(), empty + key_size + entry_size);
    }

    #[test]
    fn test_bincode_failure_propagates() {
        let result = BincodeEstimator.size_of(&Unencodable);
        assert!(matches!(result, Err(SizeError::Bincode(_))));
    }

    #[test]
    fn test_json_size() {
        let estimator = JsonEstimator;
        assert_eq!(estimator.size_of("abc").unwrap(), 5);
        assert_eq!(estimator.size_of(&vec![1, 2]).unwrap(), 5);
    }

    #[test]
    fn test_json_rejects_non_string_map_keys() {
        let mut entries = HashMap::new();
        entries.insert((1u8, 2u8), 3u8);

        let result = JsonEstimator.size_of(&entries);
        assert!(matches!(result, Err(SizeError::Json(_))));
    }
}
