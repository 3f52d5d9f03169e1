//! Async cache backend and bulk lookup traits.
//!
//! These traits provide an async alternative to the synchronous
//! [`CacheBackend`] and closure lookups. They are designed for use with async
//! runtimes like tokio, where both the cache and the data source are reached
//! over the network.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use ::async_trait::async_trait;
use bulkfetch_core::{FetchResult, Identifier};

use crate::cache::CacheBackend;

/// Async cache backend trait.
///
/// Same contract as [`CacheBackend`]: `read_multi` returns only present keys
/// and presence is decided by map membership; write failures are returned,
/// not swallowed.
#[async_trait]
pub trait AsyncCacheBackend: Send + Sync {
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;
    type Options: Send + Sync + 'static;

    /// Read all `keys` in one operation.
    async fn read_multi(
        &self,
        keys: &[Self::Key],
    ) -> FetchResult<HashMap<Self::Key, Self::Value>>;

    /// Write one value under `key`.
    async fn write(
        &self,
        key: &Self::Key,
        value: &Self::Value,
        options: &Self::Options,
    ) -> FetchResult<()>;
}

/// Bulk lookup for identifiers the cache could not serve.
///
/// `load` receives every missing identifier of one fetch at once and must
/// return one object per identifier, in the same order.
#[async_trait]
pub trait BulkLookup: Send + Sync {
    type Key: Send + Sync + 'static;
    type Context: Send + Sync + 'static;
    type Value: Send + 'static;

    async fn load(
        &self,
        missing: &[Identifier<Self::Key, Self::Context>],
    ) -> FetchResult<Vec<Self::Value>>;
}

/// Adapter serving a synchronous backend through [`AsyncCacheBackend`].
///
/// Calls run inline on the awaiting task, so the wrapped backend should not
/// block for long.
#[derive(Debug)]
pub struct SyncBackend<B> {
    inner: Arc<B>,
}

impl<B> SyncBackend<B> {
    pub fn new(inner: Arc<B>) -> Self {
        Self { inner }
    }

    /// Get a reference to the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B> Clone for SyncBackend<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl<B> AsyncCacheBackend for SyncBackend<B>
where
    B: CacheBackend + 'static,
    B::Key: 'static,
    B::Value: 'static,
    B::Options: 'static,
{
    type Key = B::Key;
    type Value = B::Value;
    type Options = B::Options;

    async fn read_multi(
        &self,
        keys: &[Self::Key],
    ) -> FetchResult<HashMap<Self::Key, Self::Value>> {
        self.inner.read_multi(keys)
    }

    async fn write(
        &self,
        key: &Self::Key,
        value: &Self::Value,
        options: &Self::Options,
    ) -> FetchResult<()> {
        self.inner.write(key, value, options)
    }
}
