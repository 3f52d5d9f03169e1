//! Error types for bulkfetch operations

use thiserror::Error;

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Bulk read of {key_count} keys failed: {reason}")]
    ReadFailed { key_count: usize, reason: String },

    #[error("Write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Errors raised while resolving cache misses through the lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Lookup returned too many objects: {returned} for {requested} identifiers")]
    TooManyObjects { requested: usize, returned: usize },

    #[error("Lookup returned too few objects: {returned} for {requested} identifiers")]
    TooFewObjects { requested: usize, returned: usize },

    #[error("Batch of {requested} missing identifiers exceeds limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    #[error("Lookup failed: {reason}")]
    LookupFailed { reason: String },
}

impl ResolveError {
    /// Check that a lookup answered every requested identifier exactly once.
    pub fn check_counts(requested: usize, returned: usize) -> Result<(), ResolveError> {
        if returned > requested {
            return Err(ResolveError::TooManyObjects {
                requested,
                returned,
            });
        }
        if returned < requested {
            return Err(ResolveError::TooFewObjects {
                requested,
                returned,
            });
        }
        Ok(())
    }

    /// Convenience constructor for lookup implementations.
    pub fn lookup_failed(reason: impl Into<String>) -> Self {
        ResolveError::LookupFailed {
            reason: reason.into(),
        }
    }

    /// Whether this is one of the two count-mismatch kinds.
    pub fn is_count_mismatch(&self) -> bool {
        matches!(
            self,
            ResolveError::TooManyObjects { .. } | ResolveError::TooFewObjects { .. }
        )
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all bulkfetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for bulkfetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

// =============================================================================
// TESTS
// =============================================================================
