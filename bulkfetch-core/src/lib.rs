//! bulkfetch Core - Identifiers, Errors and Configuration
//!
//! Pure data types shared by the fetcher crates. No cache access happens here.

pub mod config;
pub mod error;
pub mod identifier;

pub use config::FetcherConfig;
pub use error::{CacheError, ConfigError, FetchError, FetchResult, ResolveError};
pub use identifier::{cache_key, cache_keys, normalize, Identifier, Identifiers};
