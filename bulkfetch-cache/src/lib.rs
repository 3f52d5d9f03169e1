//! bulkfetch Cache - Bulk Read-Through Fetcher and Mock Backend
//!
//! Serves ordered collections of objects from a cache, resolving all misses
//! with one caller-supplied bulk lookup. The cache itself is an external
//! collaborator reached through [`CacheBackend`] or [`AsyncCacheBackend`].

pub mod async_trait;
pub mod cache;

pub use async_trait::{AsyncCacheBackend, BulkLookup, SyncBackend};

pub use cache::{
    coalesce, partition, resolve, AsyncBulkCacheFetcher, BulkCacheFetcher, CacheBackend,
    FetchStats, Partition,
};

use bulkfetch_core::{CacheError, FetchResult};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

// ============================================================================
// MOCK CACHE
// ============================================================================

/// In-memory mock cache for testing.
///
/// Records every bulk read, every write and the options each key was last
/// written with, and can be told to fail reads or individual writes.
#[derive(Debug)]
pub struct MockCache<K, V, O = ()> {
    entries: RwLock<HashMap<K, V>>,
    options: RwLock<HashMap<K, O>>,
    reads: RwLock<Vec<Vec<K>>>,
    writes: RwLock<Vec<K>>,
    read_failure: RwLock<Option<String>>,
    write_failures: RwLock<HashMap<K, String>>,
}

impl<K, V, O> Default for MockCache<K, V, O> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            options: RwLock::new(HashMap::new()),
            reads: RwLock::new(Vec::new()),
            writes: RwLock::new(Vec::new()),
            read_failure: RwLock::new(None),
            write_failures: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V, O> MockCache<K, V, O>
where
    K: Eq + Hash + Clone,
    V: Clone,
    O: Clone,
{
    /// Create a new mock cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry without recording a write.
    pub fn insert(&self, key: K, value: V) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Get a stored value.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Get count of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Options the key was last written with.
    pub fn options_for(&self, key: &K) -> Option<O> {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Number of bulk reads served.
    pub fn read_count(&self) -> usize {
        self.reads.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Keys of every bulk read, in call order.
    pub fn read_log(&self) -> Vec<Vec<K>> {
        self.reads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Keys of every successful write, in call order.
    pub fn write_log(&self) -> Vec<K> {
        self.writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every subsequent bulk read fail.
    pub fn fail_reads(&self, reason: impl Into<String>) {
        *self
            .read_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    /// Make writes to `key` fail.
    pub fn fail_write(&self, key: K, reason: impl Into<String>) {
        self.write_failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, reason.into());
    }

    /// Clear all stored data and logs.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.reads.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.writes.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl<K, V, O> CacheBackend for MockCache<K, V, O>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
    O: Clone + Send + Sync,
{
    type Key = K;
    type Value = V;
    type Options = O;

    fn read_multi(&self, keys: &[K]) -> FetchResult<HashMap<K, V>> {
        if let Some(reason) = self
            .read_failure
            .read()
            .map_err(|_| CacheError::LockPoisoned)?
            .clone()
        {
            return Err(CacheError::ReadFailed {
                key_count: keys.len(),
                reason,
            }
            .into());
        }

        self.reads
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .push(keys.to_vec());

        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    fn write(&self, key: &K, value: &V, options: &O) -> FetchResult<()> {
        if let Some(reason) = self
            .write_failures
            .read()
            .map_err(|_| CacheError::LockPoisoned)?
            .get(key)
        {
            return Err(CacheError::WriteFailed {
                key: format!("{:?}", key),
                reason: reason.clone(),
            }
            .into());
        }

        self.entries
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(key.clone(), value.clone());
        self.options
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .insert(key.clone(), options.clone());
        self.writes
            .write()
            .map_err(|_| CacheError::LockPoisoned)?
            .push(key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkfetch_core::FetchError;

    #[test]
    fn test_read_multi_returns_only_present_keys() {
        let cache: MockCache<&str, u32> = MockCache::new();
        cache.insert("a", 1);

        let found = cache.read_multi(&["a", "b", "a"]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("a"), Some(&1));
        assert_eq!(cache.read_log(), vec![vec!["a", "b", "a"]]);
    }

    #[test]
    fn test_cached_none_is_present() {
        let cache: MockCache<&str, Option<u32>> = MockCache::new();
        cache.insert("two", None);

        let found = cache.read_multi(&["two"]).unwrap();
        assert_eq!(found.get("two"), Some(&None));
    }

    #[test]
    fn test_write_records_options() {
        let cache: MockCache<u32, u32, &str> = MockCache::new();
        cache.write(&1, &10, &"expires_in=300").unwrap();

        assert_eq!(cache.get(&1), Some(10));
        assert_eq!(cache.options_for(&1), Some("expires_in=300"));
        assert_eq!(cache.write_log(), vec![1]);
    }

    #[test]
    fn test_insert_is_not_logged_as_write() {
        let cache: MockCache<u32, u32> = MockCache::new();
        cache.insert(1, 1);
        assert_eq!(cache.write_count(), 0);
        assert!(cache.contains(&1));
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_injected_failures() {
        let cache: MockCache<u32, u32> = MockCache::new();
        cache.fail_write(2, "full");
        let err = cache.write(&2, &20, &()).unwrap_err();
        assert!(matches!(err, FetchError::Cache(CacheError::WriteFailed { .. })));
        assert!(!cache.contains(&2));

        cache.fail_reads("down");
        let err = cache.read_multi(&[1]).unwrap_err();
        assert_eq!(
            err,
            FetchError::Cache(CacheError::ReadFailed {
                key_count: 1,
                reason: "down".to_string()
            })
        );
    }

    #[test]
    fn test_clear_resets_everything() {
        let cache: MockCache<u32, u32> = MockCache::new();
        cache.write(&1, &1, &()).unwrap();
        cache.read_multi(&[1]).unwrap();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.read_count(), 0);
        assert_eq!(cache.write_count(), 0);
    }
}
