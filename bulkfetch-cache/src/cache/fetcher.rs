//! Bulk read-through fetcher.
//!
//! Serves an ordered list of identifiers from the cache, resolving every miss
//! with a single lookup call and caching what it finds.

use std::sync::Arc;

use bulkfetch_core::{
    normalize, FetchResult, FetcherConfig, Identifier, Identifiers, ResolveError,
};

use super::pipeline::{coalesce, dedupe_missing, merge_resolved, partition, resolve};
use super::traits::{CacheBackend, FetchStats};

/// Bulk read-through cache fetcher.
///
/// A fetch runs four phases: normalize the input, partition it against one
/// bulk cache read, resolve the misses with one lookup call (writing each
/// result back), then coalesce cached and resolved objects into input order.
///
/// # Type Parameters
///
/// - `B`: The cache backend consulted and populated by every fetch
///
/// # Example
///
/// ```ignore
/// let fetcher = BulkCacheFetcher::with_defaults(Arc::new(cache));
///
/// let users = fetcher.fetch(Identifiers::from_keys(ids), &ttl, |missing| {
///     db.load_users(missing)
/// })?;
/// ```
pub struct BulkCacheFetcher<B>
where
    B: CacheBackend,
{
    /// The cache backend.
    cache: Arc<B>,
    /// Fetcher configuration.
    config: FetcherConfig,
}

impl<B> BulkCacheFetcher<B>
where
    B: CacheBackend,
{
    /// Create a new fetcher, rejecting an invalid configuration.
    pub fn new(cache: Arc<B>, config: FetcherConfig) -> FetchResult<Self> {
        config.validate()?;
        Ok(Self { cache, config })
    }

    /// Create a new fetcher with default configuration.
    pub fn with_defaults(cache: Arc<B>) -> Self {
        Self {
            cache,
            config: FetcherConfig::default(),
        }
    }

    /// Get the fetcher configuration.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Get a reference to the cache backend.
    pub fn backend(&self) -> &B {
        &self.cache
    }

    /// Fetch objects for `identifiers`, in their order.
    ///
    /// `lookup` is called at most once, with exactly the identifiers whose
    /// keys were missing from the cache, and must answer each of them by
    /// position. `options` is passed unmodified to every cache write.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TooManyObjects`] or
    /// [`ResolveError::TooFewObjects`] when the lookup's answer count is
    /// wrong; cache and lookup errors are returned as they were raised.
    pub fn fetch<C, F>(
        &self,
        identifiers: impl Into<Identifiers<B::Key, C>>,
        options: &B::Options,
        lookup: F,
    ) -> FetchResult<Vec<B::Value>>
    where
        F: FnOnce(&[Identifier<B::Key, C>]) -> FetchResult<Vec<B::Value>>,
    {
        self.fetch_with_stats(identifiers, options, lookup)
            .map(|(objects, _)| objects)
    }

    /// Fetch a single object.
    ///
    /// Behaves like [`fetch`](Self::fetch) on a one-element input, but
    /// returns the object itself.
    pub fn fetch_one<C, F>(
        &self,
        identifier: impl Into<Identifier<B::Key, C>>,
        options: &B::Options,
        lookup: F,
    ) -> FetchResult<B::Value>
    where
        F: FnOnce(&[Identifier<B::Key, C>]) -> FetchResult<Vec<B::Value>>,
    {
        let objects = self.fetch(Identifiers::One(identifier.into()), options, lookup)?;
        objects.into_iter().next().ok_or_else(|| {
            ResolveError::TooFewObjects {
                requested: 1,
                returned: 0,
            }
            .into()
        })
    }

    /// Fetch by bare keys; the lookup receives the missing keys directly.
    pub fn fetch_keys<I, F>(
        &self,
        keys: I,
        options: &B::Options,
        lookup: F,
    ) -> FetchResult<Vec<B::Value>>
    where
        I: IntoIterator<Item = B::Key>,
        F: FnOnce(&[B::Key]) -> FetchResult<Vec<B::Value>>,
    {
        self.fetch(
            Identifiers::<B::Key, ()>::from_keys(keys),
            options,
            |missing| {
                let keys: Vec<B::Key> = missing.iter().map(|id| id.key().clone()).collect();
                lookup(&keys)
            },
        )
    }

    /// Fetch with the backend's default write options.
    pub fn fetch_with_defaults<C, F>(
        &self,
        identifiers: impl Into<Identifiers<B::Key, C>>,
        lookup: F,
    ) -> FetchResult<Vec<B::Value>>
    where
        B::Options: Default,
        F: FnOnce(&[Identifier<B::Key, C>]) -> FetchResult<Vec<B::Value>>,
    {
        self.fetch(identifiers, &B::Options::default(), lookup)
    }

    /// Fetch and report hit/miss statistics alongside the objects.
    pub fn fetch_with_stats<C, F>(
        &self,
        identifiers: impl Into<Identifiers<B::Key, C>>,
        options: &B::Options,
        lookup: F,
    ) -> FetchResult<(Vec<B::Value>, FetchStats)>
    where
        F: FnOnce(&[Identifier<B::Key, C>]) -> FetchResult<Vec<B::Value>>,
    {
        let identifiers = normalize(identifiers);
        let mut part = partition(self.cache.as_ref(), identifiers)?;
        let mut stats = FetchStats {
            requested: part.keys.len(),
            hits: part.hits(),
            misses: part.missing.len(),
            ..Default::default()
        };
        tracing::debug!(
            requested = stats.requested,
            hits = stats.hits,
            misses = stats.misses,
            "Partitioned bulk fetch"
        );

        let objects = if self.config.dedupe_missing {
            let unique = dedupe_missing(part.missing);
            let resolved = resolve(
                self.cache.as_ref(),
                &unique,
                options,
                self.config.max_missing,
                lookup,
            )?;
            stats.resolved = unique.len();
            merge_resolved(&mut part.found, &unique, resolved);
            coalesce(&part.keys, &part.found, Vec::new())?
        } else {
            let resolved = resolve(
                self.cache.as_ref(),
                &part.missing,
                options,
                self.config.max_missing,
                lookup,
            )?;
            stats.resolved = part.missing.len();
            coalesce(&part.keys, &part.found, resolved)?
        };
        stats.writes = stats.resolved;

        Ok((objects, stats))
    }
}

impl<B> Clone for BulkCacheFetcher<B>
where
    B: CacheBackend,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}
