//! Async bulk read-through fetcher.
//!
//! Same pipeline as [`BulkCacheFetcher`](super::BulkCacheFetcher), awaiting
//! the backend and the lookup instead of blocking on them.

use std::sync::Arc;

use bulkfetch_core::{
    cache_keys, normalize, FetchResult, FetcherConfig, Identifier, Identifiers, ResolveError,
};

use super::pipeline::{
    check_batch_limit, coalesce, dedupe_missing, log_write_failure, merge_resolved, split_missing,
    trace_write, verify_counts, Partition,
};
use super::traits::FetchStats;
use crate::async_trait::{AsyncCacheBackend, BulkLookup};

/// Async bulk read-through cache fetcher.
///
/// Performs one awaited bulk read, at most one awaited lookup, then the
/// awaited writes one key at a time. Nothing is spawned; all work happens on
/// the calling task.
pub struct AsyncBulkCacheFetcher<B>
where
    B: AsyncCacheBackend,
{
    /// The cache backend.
    cache: Arc<B>,
    /// Fetcher configuration.
    config: FetcherConfig,
}

impl<B> AsyncBulkCacheFetcher<B>
where
    B: AsyncCacheBackend,
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
    /// See [`BulkCacheFetcher::fetch`](super::BulkCacheFetcher::fetch) for
    /// the contract.
    pub async fn fetch<L>(
        &self,
        identifiers: impl Into<Identifiers<B::Key, L::Context>>,
        options: &B::Options,
        lookup: &L,
    ) -> FetchResult<Vec<B::Value>>
    where
        L: BulkLookup<Key = B::Key, Value = B::Value>,
    {
        self.fetch_with_stats(identifiers, options, lookup)
            .await
            .map(|(objects, _)| objects)
    }

    /// Fetch a single object.
    pub async fn fetch_one<L>(
        &self,
        identifier: impl Into<Identifier<B::Key, L::Context>>,
        options: &B::Options,
        lookup: &L,
    ) -> FetchResult<B::Value>
    where
        L: BulkLookup<Key = B::Key, Value = B::Value>,
    {
        let objects = self
            .fetch(Identifiers::One(identifier.into()), options, lookup)
            .await?;
        objects.into_iter().next().ok_or_else(|| {
            ResolveError::TooFewObjects {
                requested: 1,
                returned: 0,
            }
            .into()
        })
    }

    /// Fetch and report hit/miss statistics alongside the objects.
    pub async fn fetch_with_stats<L>(
        &self,
        identifiers: impl Into<Identifiers<B::Key, L::Context>>,
        options: &B::Options,
        lookup: &L,
    ) -> FetchResult<(Vec<B::Value>, FetchStats)>
    where
        L: BulkLookup<Key = B::Key, Value = B::Value>,
    {
        let identifiers = normalize(identifiers);
        let mut part = self.partition(identifiers).await?;
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
            "Partitioned async bulk fetch"
        );

        let objects = if self.config.dedupe_missing {
            let unique = dedupe_missing(part.missing);
            let resolved = self.resolve(&unique, options, lookup).await?;
            stats.resolved = unique.len();
            merge_resolved(&mut part.found, &unique, resolved);
            coalesce(&part.keys, &part.found, Vec::new())?
        } else {
            let resolved = self.resolve(&part.missing, options, lookup).await?;
            stats.resolved = part.missing.len();
            coalesce(&part.keys, &part.found, resolved)?
        };
        stats.writes = stats.resolved;

        Ok((objects, stats))
    }

    async fn partition<C>(
        &self,
        identifiers: Vec<Identifier<B::Key, C>>,
    ) -> FetchResult<Partition<B::Key, B::Value, C>> {
        let keys = cache_keys(&identifiers);
        let found = self.cache.read_multi(&keys).await.inspect_err(|e| {
            tracing::error!(error = %e, key_count = keys.len(), "Bulk cache read failed");
        })?;
        let missing = split_missing(identifiers, &found);

        Ok(Partition {
            keys,
            found,
            missing,
        })
    }

    async fn resolve<L>(
        &self,
        missing: &[Identifier<B::Key, L::Context>],
        options: &B::Options,
        lookup: &L,
    ) -> FetchResult<Vec<B::Value>>
    where
        L: BulkLookup<Key = B::Key, Value = B::Value>,
    {
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        check_batch_limit(missing.len(), self.config.max_missing)?;

        let objects = lookup.load(missing).await?;
        verify_counts(missing.len(), objects.len())?;

        // Mirrors pipeline::write_back, awaiting each write.
        for (identifier, object) in missing.iter().zip(&objects) {
            let key = identifier.key();
            trace_write(key);
            self.cache
                .write(key, object, options)
                .await
                .inspect_err(|e| log_write_failure(key, e))?;
        }

        Ok(objects)
    }
}

impl<B> Clone for AsyncBulkCacheFetcher<B>
where
    B: AsyncCacheBackend,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}
