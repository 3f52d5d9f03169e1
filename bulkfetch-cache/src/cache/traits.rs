//! Cache backend trait and fetch statistics.
//!
//! This module defines the narrow contract a cache must satisfy to serve a
//! [`BulkCacheFetcher`](super::BulkCacheFetcher). Storage, expiry and
//! eviction all live behind it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use bulkfetch_core::FetchResult;

/// Cache backend trait for pluggable cache implementations.
///
/// This trait abstracts over different cache backends (e.g., Redis,
/// memcached, in-process maps). Implementations should be thread-safe if the
/// fetcher is shared across threads.
///
/// # Presence
///
/// `read_multi` decides hit or miss by membership in the returned map, never
/// by the value itself. A backend that stores an empty value (e.g. `None`
/// when `Value = Option<T>`) must return it as present.
///
/// # Options
///
/// `Options` is whatever the backend accepts per write (expiry, tags, ...).
/// The fetcher passes it through by reference and never inspects it.
pub trait CacheBackend: Send + Sync {
    /// Cache key type.
    type Key: Eq + Hash + Clone + Debug + Send + Sync;
    /// Cached object type.
    type Value: Clone + Send + Sync;
    /// Per-write options.
    type Options: Send + Sync;

    /// Read all `keys` in one operation.
    ///
    /// Returns only the keys currently present. `keys` may contain duplicates.
    fn read_multi(&self, keys: &[Self::Key]) -> FetchResult<HashMap<Self::Key, Self::Value>>;

    /// Write one value under `key`.
    fn write(
        &self,
        key: &Self::Key,
        value: &Self::Value,
        options: &Self::Options,
    ) -> FetchResult<()>;
}

/// Statistics about a single fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Number of identifiers requested (after normalization).
    pub requested: usize,
    /// Identifiers served from the cache.
    pub hits: usize,
    /// Identifiers absent from the cache.
    pub misses: usize,
    /// Identifiers handed to the lookup.
    pub resolved: usize,
    /// Cache writes performed.
    pub writes: usize,
}

impl FetchStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            self.hits as f64 / self.requested as f64
        }
    }

    /// Whether the lookup was invoked.
    pub fn lookup_invoked(&self) -> bool {
        self.resolved > 0
    }
}
