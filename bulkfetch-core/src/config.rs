//! Fetcher configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for a bulk cache fetcher.
///
/// The defaults reproduce the plain read-through behavior: every missing
/// occurrence is sent to the lookup, with no batch limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Send each missing cache key to the lookup once and share the resolved
    /// object between all occurrences of that key.
    pub dedupe_missing: bool,
    /// Upper bound on identifiers handed to a single lookup call.
    pub max_missing: Option<usize>,
}

impl FetcherConfig {
    /// Create a new fetcher config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable deduplication of missing keys.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_missing = enabled;
        self
    }

    /// Set the maximum lookup batch size.
    pub fn with_max_missing(mut self, limit: usize) -> Self {
        self.max_missing = Some(limit);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_missing == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_missing".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}
