//! bulkfetch Test Utilities
//!
//! Centralized test infrastructure for the bulkfetch workspace:
//! - A call-recording lookup usable from sync and async fetchers
//! - Proptest generators for identifiers and cache states
//! - Fixtures for seeded caches and fetchers
//! - Custom assertions for fetch errors

// Re-export the mock cache from its source crate
pub use bulkfetch_cache::MockCache;

// Re-export core types for convenience
pub use bulkfetch_cache::{
    AsyncBulkCacheFetcher, BulkCacheFetcher, BulkLookup, CacheBackend, FetchStats, SyncBackend,
};
pub use bulkfetch_core::{
    CacheError, ConfigError, FetchError, FetchResult, FetcherConfig, Identifier, Identifiers,
    ResolveError,
};

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

// ============================================================================
// RECORDING LOOKUP
// ============================================================================

type AnswerFn<K, C, V> = Box<dyn Fn(&Identifier<K, C>) -> V + Send + Sync>;

/// Lookup that answers each identifier with a function and records every
/// batch it is called with.
///
/// Can be told to answer with too few or too many objects, or to fail.
pub struct RecordingLookup<K, C, V> {
    answer: AnswerFn<K, C, V>,
    calls: Mutex<Vec<Vec<Identifier<K, C>>>>,
    short_by: usize,
    extra: usize,
    failure: Option<String>,
}

impl<K, C, V> RecordingLookup<K, C, V>
where
    K: Clone,
    C: Clone,
    V: Clone,
{
    pub fn new<F>(answer: F) -> Self
    where
        F: Fn(&Identifier<K, C>) -> V + Send + Sync + 'static,
    {
        Self {
            answer: Box::new(answer),
            calls: Mutex::new(Vec::new()),
            short_by: 0,
            extra: 0,
            failure: None,
        }
    }

    /// Return `n` fewer objects than requested.
    pub fn short_by(mut self, n: usize) -> Self {
        self.short_by = n;
        self
    }

    /// Return `n` more objects than requested.
    pub fn with_extra(mut self, n: usize) -> Self {
        self.extra = n;
        self
    }

    /// Fail every call with a lookup error.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Answer one batch, recording it.
    pub fn call(&self, missing: &[Identifier<K, C>]) -> FetchResult<Vec<V>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(missing.to_vec());

        if let Some(reason) = &self.failure {
            return Err(ResolveError::lookup_failed(reason.clone()).into());
        }

        let mut objects: Vec<V> = missing.iter().map(|id| (self.answer)(id)).collect();
        objects.truncate(objects.len().saturating_sub(self.short_by));
        if let Some(last) = missing.last() {
            for _ in 0..self.extra {
                objects.push((self.answer)(last));
            }
        }
        Ok(objects)
    }

    /// Borrow as a closure for the sync fetcher.
    pub fn as_fn(&self) -> impl FnOnce(&[Identifier<K, C>]) -> FetchResult<Vec<V>> + '_ {
        move |missing| self.call(missing)
    }

    /// Number of times the lookup ran.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Every batch received, in call order.
    pub fn calls(&self) -> Vec<Vec<Identifier<K, C>>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Keys of every identifier received, flattened across calls.
    pub fn requested_keys(&self) -> Vec<K> {
        self.calls()
            .iter()
            .flatten()
            .map(|id| id.key().clone())
            .collect()
    }
}

#[async_trait]
impl<K, C, V> BulkLookup for RecordingLookup<K, C, V>
where
    K: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Key = K;
    type Context = C;
    type Value = V;

    async fn load(&self, missing: &[Identifier<K, C>]) -> FetchResult<Vec<V>> {
        self.call(missing)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for identifiers and cache contents.
    //!
    //! Keys are drawn from a small range so inputs regularly contain
    //! duplicates and overlap with the cache.

    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    /// Upper bound (exclusive) of generated keys.
    pub const KEY_SPACE: u16 = 48;

    /// Generate a cache key.
    pub fn arb_key() -> impl Strategy<Value = u16> {
        0..KEY_SPACE
    }

    /// Generate a simple or composite identifier.
    pub fn arb_identifier() -> impl Strategy<Value = Identifier<u16, u8>> {
        prop_oneof![
            arb_key().prop_map(Identifier::<u16, u8>::simple),
            (arb_key(), any::<u8>()).prop_map(|(key, ctx)| Identifier::composite(key, ctx)),
        ]
    }

    /// Generate an ordered identifier list, duplicates allowed.
    pub fn arb_identifiers(max_len: usize) -> impl Strategy<Value = Vec<Identifier<u16, u8>>> {
        prop::collection::vec(arb_identifier(), 0..=max_len)
    }

    /// Generate cache contents, including cached empty values.
    pub fn arb_cache_state() -> impl Strategy<Value = HashMap<u16, Option<u32>>> {
        prop::collection::hash_map(arb_key(), prop::option::of(any::<u32>()), 0..32)
    }

    /// Generate a fetcher configuration.
    pub fn arb_fetcher_config() -> impl Strategy<Value = FetcherConfig> {
        (any::<bool>(), prop::option::of(1usize..64)).prop_map(|(dedupe, max)| FetcherConfig {
            dedupe_missing: dedupe,
            max_missing: max,
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built caches and fetchers for common scenarios.

    use super::*;
    use std::fmt::Debug;
    use std::hash::Hash;
    use std::sync::Arc;

    /// Cache pre-populated with `entries`. Seeding does not count as writes.
    pub fn seeded_cache<K, V, O>(entries: &[(K, V)]) -> Arc<MockCache<K, V, O>>
    where
        K: Eq + Hash + Clone,
        V: Clone,
        O: Clone,
    {
        let cache = MockCache::new();
        for (key, value) in entries {
            cache.insert(key.clone(), value.clone());
        }
        Arc::new(cache)
    }

    /// Default-configured fetcher over a seeded cache; returns both.
    pub fn seeded_fetcher<K, V, O>(
        entries: &[(K, V)],
    ) -> (Arc<MockCache<K, V, O>>, BulkCacheFetcher<MockCache<K, V, O>>)
    where
        K: Eq + Hash + Clone + Debug + Send + Sync,
        V: Clone + Send + Sync,
        O: Clone + Send + Sync,
    {
        let cache = seeded_cache(entries);
        let fetcher = BulkCacheFetcher::with_defaults(Arc::clone(&cache));
        (cache, fetcher)
    }

    /// Async fetcher over a seeded cache, served through [`SyncBackend`].
    pub fn seeded_async_fetcher<K, V, O>(
        entries: &[(K, V)],
    ) -> (
        Arc<MockCache<K, V, O>>,
        AsyncBulkCacheFetcher<SyncBackend<MockCache<K, V, O>>>,
    )
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        O: Clone + Send + Sync + 'static,
    {
        let cache = seeded_cache(entries);
        let backend = SyncBackend::new(Arc::clone(&cache));
        let fetcher = AsyncBulkCacheFetcher::with_defaults(Arc::new(backend));
        (cache, fetcher)
    }

    /// Lookup answering `key + offset`, like a finder that derives objects
    /// from their ids.
    pub fn offset_lookup(offset: u32) -> RecordingLookup<u32, (), u32> {
        RecordingLookup::new(move |id: &Identifier<u32>| id.key() + offset)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for fetch results.

    use super::*;

    /// Assert that a FetchResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &FetchResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a FetchResult is a TooManyObjects error.
    #[track_caller]
    pub fn assert_too_many_objects<T: std::fmt::Debug>(result: &FetchResult<T>) {
        match result {
            Err(FetchError::Resolve(ResolveError::TooManyObjects { .. })) => {}
            other => panic!("Expected TooManyObjects error, got: {:?}", other),
        }
    }

    /// Assert that a FetchResult is a TooFewObjects error.
    #[track_caller]
    pub fn assert_too_few_objects<T: std::fmt::Debug>(result: &FetchResult<T>) {
        match result {
            Err(FetchError::Resolve(ResolveError::TooFewObjects { .. })) => {}
            other => panic!("Expected TooFewObjects error, got: {:?}", other),
        }
    }

    /// Assert that a FetchResult is a Cache error.
    #[track_caller]
    pub fn assert_cache_error<T: std::fmt::Debug>(result: &FetchResult<T>) {
        match result {
            Err(FetchError::Cache(_)) => {}
            other => panic!("Expected Cache error, got: {:?}", other),
        }
    }

    /// Assert that a FetchResult carries the lookup's own failure.
    #[track_caller]
    pub fn assert_lookup_failed<T: std::fmt::Debug>(result: &FetchResult<T>, reason: &str) {
        match result {
            Err(FetchError::Resolve(ResolveError::LookupFailed { reason: got })) => {
                assert_eq!(got, reason, "Wrong reason in LookupFailed error");
            }
            other => panic!("Expected LookupFailed({}), got: {:?}", reason, other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
