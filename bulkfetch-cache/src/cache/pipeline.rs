//! Partition, resolve and coalesce phases of a bulk fetch.
//!
//! Each phase is a free function so the sync and async fetchers share the
//! same rules. Only [`partition`] and [`resolve`] touch the backend.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use bulkfetch_core::{cache_keys, FetchError, FetchResult, Identifier, ResolveError};

use super::traits::CacheBackend;

/// Result of splitting the input against one bulk cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<K, V, C>
where
    K: Eq + Hash,
{
    /// Cache keys of the full input, in input order.
    pub keys: Vec<K>,
    /// Objects already present in the cache.
    pub found: HashMap<K, V>,
    /// Identifiers whose key was absent, in input order.
    pub missing: Vec<Identifier<K, C>>,
}

impl<K, V, C> Partition<K, V, C>
where
    K: Eq + Hash,
{
    /// Number of input positions served from the cache.
    pub fn hits(&self) -> usize {
        self.keys.len().saturating_sub(self.missing.len())
    }
}

// ============================================================================
// PARTITION
// ============================================================================

/// Read every derived key in one call and split the input into hits and
/// misses.
///
/// Duplicate keys are passed to the backend as they are. The cache is never
/// written here.
pub fn partition<B, C>(
    backend: &B,
    identifiers: Vec<Identifier<B::Key, C>>,
) -> FetchResult<Partition<B::Key, B::Value, C>>
where
    B: CacheBackend + ?Sized,
{
    let keys = cache_keys(&identifiers);
    let found = backend.read_multi(&keys).inspect_err(|e| {
        tracing::error!(error = %e, key_count = keys.len(), "Bulk cache read failed");
    })?;
    let missing = split_missing(identifiers, &found);

    Ok(Partition {
        keys,
        found,
        missing,
    })
}

/// Keep the identifiers whose key is not in `found`, preserving order.
pub(crate) fn split_missing<K, V, C>(
    identifiers: Vec<Identifier<K, C>>,
    found: &HashMap<K, V>,
) -> Vec<Identifier<K, C>>
where
    K: Eq + Hash,
{
    identifiers
        .into_iter()
        .filter(|identifier| !found.contains_key(identifier.key()))
        .collect()
}

/// Drop repeated keys, keeping the first occurrence of each.
pub fn dedupe_missing<K, C>(missing: Vec<Identifier<K, C>>) -> Vec<Identifier<K, C>>
where
    K: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(missing.len());
    missing
        .into_iter()
        .filter(|identifier| seen.insert(identifier.key().clone()))
        .collect()
}

// ============================================================================
// RESOLVE
// ============================================================================

/// Fail before the lookup runs if the batch is over the configured limit.
pub fn check_batch_limit(requested: usize, limit: Option<usize>) -> Result<(), ResolveError> {
    match limit {
        Some(limit) if requested > limit => Err(ResolveError::BatchTooLarge { requested, limit }),
        _ => Ok(()),
    }
}

/// Validate the lookup's answer count, logging a mismatch.
pub fn verify_counts(requested: usize, returned: usize) -> Result<(), ResolveError> {
    ResolveError::check_counts(requested, returned).inspect_err(|e| {
        tracing::warn!(requested, returned, error = %e, "Lookup returned wrong object count");
    })
}

/// Resolve missing identifiers with one lookup call and write the results
/// back to the cache.
///
/// With nothing missing this returns immediately: the lookup is not called
/// and the cache is not touched. Otherwise `lookup` receives the full
/// `missing` slice once, its answer count is checked, and each object is
/// written under the key of the identifier at the same position.
pub fn resolve<B, C, F>(
    backend: &B,
    missing: &[Identifier<B::Key, C>],
    options: &B::Options,
    max_missing: Option<usize>,
    lookup: F,
) -> FetchResult<Vec<B::Value>>
where
    B: CacheBackend + ?Sized,
    F: FnOnce(&[Identifier<B::Key, C>]) -> FetchResult<Vec<B::Value>>,
{
    if missing.is_empty() {
        return Ok(Vec::new());
    }
    check_batch_limit(missing.len(), max_missing)?;

    let objects = lookup(missing)?;
    verify_counts(missing.len(), objects.len())?;
    write_back(backend, missing, &objects, options)?;

    Ok(objects)
}

/// Write each object under its identifier's key, in order.
///
/// Stops at the first failing write; earlier writes stay in place.
pub fn write_back<B, C>(
    backend: &B,
    identifiers: &[Identifier<B::Key, C>],
    objects: &[B::Value],
    options: &B::Options,
) -> FetchResult<()>
where
    B: CacheBackend + ?Sized,
{
    for (identifier, object) in identifiers.iter().zip(objects) {
        let key = identifier.key();
        trace_write(key);
        backend
            .write(key, object, options)
            .inspect_err(|e| log_write_failure(key, e))?;
    }
    Ok(())
}

/// Logged before each write-back, sync or async.
pub(crate) fn trace_write<K: Debug>(key: &K) {
    tracing::trace!(key = ?key, "Caching resolved object");
}

/// Logged when a write-back fails, sync or async.
pub(crate) fn log_write_failure<K: Debug>(key: &K, error: &FetchError) {
    tracing::error!(error = %error, key = ?key, "Cache write failed");
}

// ============================================================================
// COALESCE
// ============================================================================

/// Reassemble results in input order.
///
/// For each key, the cached object is used if present; otherwise the next
/// resolved object is taken. Resolved objects are consumed strictly in the
/// order given, so every miss occurrence consumes exactly one of them.
pub fn coalesce<K, V>(
    keys: &[K],
    found: &HashMap<K, V>,
    resolved: Vec<V>,
) -> Result<Vec<V>, ResolveError>
where
    K: Eq + Hash,
    V: Clone,
{
    let requested = resolved.len();
    let mut cursor = resolved.into_iter();
    let mut consumed = 0;
    let mut results = Vec::with_capacity(keys.len());

    for key in keys {
        match found.get(key) {
            Some(object) => results.push(object.clone()),
            None => {
                let object = cursor.next().ok_or(ResolveError::TooFewObjects {
                    requested: consumed + 1,
                    returned: requested,
                })?;
                consumed += 1;
                results.push(object);
            }
        }
    }

    let leftover = cursor.len();
    if leftover > 0 {
        return Err(ResolveError::TooManyObjects {
            requested: consumed,
            returned: consumed + leftover,
        });
    }

    Ok(results)
}

/// Merge deduplicated resolutions into the found map so that every
/// occurrence of a resolved key is served from it.
pub fn merge_resolved<K, V, C>(
    found: &mut HashMap<K, V>,
    resolved_for: &[Identifier<K, C>],
    resolved: Vec<V>,
) where
    K: Eq + Hash + Clone,
{
    for (identifier, object) in resolved_for.iter().zip(resolved) {
        found.insert(identifier.key().clone(), object);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkfetch_core::CacheError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<u32, u32>>,
        reads: Mutex<Vec<Vec<u32>>>,
        writes: Mutex<Vec<(u32, u32, &'static str)>>,
        fail_write_on: Option<u32>,
    }

    impl MapCache {
        fn with_entries(entries: &[(u32, u32)]) -> Self {
            Self {
                entries: Mutex::new(entries.iter().copied().collect()),
                ..Default::default()
            }
        }
    }

    impl CacheBackend for MapCache {
        type Key = u32;
        type Value = u32;
        type Options = &'static str;

        fn read_multi(&self, keys: &[u32]) -> FetchResult<HashMap<u32, u32>> {
            self.reads.lock().unwrap().push(keys.to_vec());
            let entries = self.entries.lock().unwrap();
            Ok(keys
                .iter()
                .filter_map(|k| entries.get(k).map(|v| (*k, *v)))
                .collect())
        }

        fn write(&self, key: &u32, value: &u32, options: &&'static str) -> FetchResult<()> {
            if self.fail_write_on == Some(*key) {
                return Err(CacheError::WriteFailed {
                    key: key.to_string(),
                    reason: "rejected".to_string(),
                }
                .into());
            }
            self.writes.lock().unwrap().push((*key, *value, *options));
            self.entries.lock().unwrap().insert(*key, *value);
            Ok(())
        }
    }

    fn ids(keys: &[u32]) -> Vec<Identifier<u32>> {
        keys.iter().copied().map(Identifier::simple).collect()
    }

    #[test]
    fn test_partition_reads_once_with_duplicates() {
        let cache = MapCache::with_entries(&[(1, 10)]);
        let part = partition(&cache, ids(&[1, 2, 1, 2])).unwrap();

        assert_eq!(*cache.reads.lock().unwrap(), vec![vec![1, 2, 1, 2]]);
        assert_eq!(part.keys, vec![1, 2, 1, 2]);
        assert_eq!(part.missing, ids(&[2, 2]));
        assert_eq!(part.hits(), 2);
        assert!(cache.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_partition_of_empty_input_still_reads() {
        let cache = MapCache::default();
        let part = partition(&cache, ids(&[])).unwrap();

        assert_eq!(*cache.reads.lock().unwrap(), vec![Vec::<u32>::new()]);
        assert!(part.keys.is_empty());
        assert_eq!(part.hits(), 0);
    }

    #[test]
    fn test_hits_saturates_on_inconsistent_partition() {
        let part: Partition<u32, u32, ()> = Partition {
            keys: vec![1],
            found: HashMap::new(),
            missing: ids(&[1, 2, 3]),
        };
        assert_eq!(part.hits(), 0);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence_order() {
        let missing = vec![
            Identifier::composite(3, "a"),
            Identifier::composite(1, "b"),
            Identifier::composite(3, "c"),
        ];
        assert_eq!(
            dedupe_missing(missing),
            vec![Identifier::composite(3, "a"), Identifier::composite(1, "b")]
        );
    }

    #[test]
    fn test_resolve_empty_skips_lookup_and_cache() {
        let cache = MapCache::default();
        let mut called = false;
        let resolved = resolve(&cache, &ids(&[]), &"opts", None, |_| {
            called = true;
            Ok(vec![])
        })
        .unwrap();

        assert!(resolved.is_empty());
        assert!(!called);
        assert!(cache.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_writes_in_order_with_options() {
        let cache = MapCache::default();
        let resolved = resolve(&cache, &ids(&[2, 3]), &"ttl=300", None, |missing| {
            Ok(missing.iter().map(|id| id.key() + 2).collect())
        })
        .unwrap();

        assert_eq!(resolved, vec![4, 5]);
        assert_eq!(
            *cache.writes.lock().unwrap(),
            vec![(2, 4, "ttl=300"), (3, 5, "ttl=300")]
        );
    }

    #[test]
    fn test_resolve_count_mismatch_writes_nothing() {
        let cache = MapCache::default();
        let err = resolve(&cache, &ids(&[1, 2]), &"", None, |_| Ok(vec![1])).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Resolve(ResolveError::TooFewObjects {
                requested: 2,
                returned: 1
            })
        ));

        let err = resolve(&cache, &ids(&[1, 2]), &"", None, |_| Ok(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            FetchError::Resolve(ResolveError::TooManyObjects {
                requested: 2,
                returned: 3
            })
        ));
        assert!(cache.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_batch_limit_blocks_lookup() {
        let cache = MapCache::default();
        let mut called = false;
        let err = resolve(&cache, &ids(&[1, 2, 3]), &"", Some(2), |_| {
            called = true;
            Ok(vec![1, 2, 3])
        })
        .unwrap_err();

        assert_eq!(
            err,
            FetchError::Resolve(ResolveError::BatchTooLarge {
                requested: 3,
                limit: 2
            })
        );
        assert!(!called);
    }

    #[test]
    fn test_write_failure_keeps_earlier_writes() {
        let cache = MapCache {
            fail_write_on: Some(3),
            ..Default::default()
        };
        let err = resolve(&cache, &ids(&[2, 3, 4]), &"", None, |_| Ok(vec![20, 30, 40]))
            .unwrap_err();

        assert!(matches!(err, FetchError::Cache(CacheError::WriteFailed { .. })));
        assert_eq!(*cache.writes.lock().unwrap(), vec![(2, 20, "")]);
    }

    #[test]
    fn test_lookup_error_propagates_unchanged() {
        let cache = MapCache::default();
        let err = resolve(&cache, &ids(&[1]), &"", None, |_| {
            Err(ResolveError::lookup_failed("db down").into())
        })
        .unwrap_err();
        assert_eq!(err, FetchError::from(ResolveError::lookup_failed("db down")));
    }

    #[test]
    fn test_coalesce_interleaves_in_input_order() {
        let found: HashMap<u32, u32> = [(1, 3), (2, 4)].into_iter().collect();
        let out = coalesce(&[2, 3, 1, 4], &found, vec![5, 6]).unwrap();
        assert_eq!(out, vec![4, 5, 3, 6]);
    }

    #[test]
    fn test_coalesce_duplicate_misses_consume_separate_slots() {
        let found = HashMap::new();
        let out = coalesce(&[7, 7], &found, vec![70, 71]).unwrap();
        assert_eq!(out, vec![70, 71]);
    }

    #[test]
    fn test_coalesce_reports_misaligned_resolution() {
        let found: HashMap<u32, u32> = HashMap::new();
        assert!(matches!(
            coalesce(&[1, 2], &found, vec![10]),
            Err(ResolveError::TooFewObjects { .. })
        ));
        assert!(matches!(
            coalesce(&[1], &found, vec![10, 20]),
            Err(ResolveError::TooManyObjects {
                requested: 1,
                returned: 2
            })
        ));
    }

    #[test]
    fn test_merge_resolved_broadcasts_by_key() {
        let mut found: HashMap<u32, u32> = [(1, 10)].into_iter().collect();
        merge_resolved(&mut found, &ids(&[2]), vec![20]);
        let out = coalesce(&[2, 1, 2], &found, Vec::new()).unwrap();
        assert_eq!(out, vec![20, 10, 20]);
    }
}
