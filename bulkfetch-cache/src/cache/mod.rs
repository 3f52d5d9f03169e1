//! Bulk read-through fetching.
//!
//! This module turns "load these N objects" into one bulk cache read, at most
//! one bulk lookup for whatever was missing, and one cache write per newly
//! resolved object.
//!
//! # Ordering
//!
//! Results always come back in the order of the input identifiers, whether an
//! object was served from the cache or resolved by the lookup. The lookup
//! must answer its identifiers positionally; an answer of the wrong length
//! fails the whole fetch before anything is cached.
//!
//! # Duplicates
//!
//! By default every occurrence of a missing key is sent to the lookup and
//! consumes one answer. With [`FetcherConfig::dedupe_missing`] each missing
//! key is resolved once and shared by all of its occurrences.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = BulkCacheFetcher::with_defaults(Arc::new(cache));
//!
//! // Composite identifiers cache under the key; the context reaches the lookup.
//! let ids = vec![
//!     Identifier::composite(post_id, LoadOptions::WithComments),
//!     Identifier::simple(other_post_id),
//! ];
//! let posts = fetcher.fetch(ids, &expiry, |missing| repo.load_posts(missing))?;
//! ```
//!
//! [`FetcherConfig::dedupe_missing`]: bulkfetch_core::FetcherConfig::dedupe_missing

pub mod async_fetcher;
pub mod fetcher;
pub mod pipeline;
pub mod traits;

pub use async_fetcher::AsyncBulkCacheFetcher;
pub use fetcher::BulkCacheFetcher;
pub use pipeline::{coalesce, dedupe_missing, partition, resolve, write_back, Partition};
pub use traits::{CacheBackend, FetchStats};
