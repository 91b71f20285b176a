//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// Every variant is a local, recoverable condition. None of them leaves a
/// shard in an inconsistent state.
#[derive(Error, Debug)]
pub enum CacheError {
    /// `add` on a key that holds a live item
    #[error("Item {0} already exists")]
    AlreadyExists(String),

    /// Mutation of a key that is absent or expired
    #[error("Item {0} not found")]
    NotFound(String),

    /// Numeric mutation against a value of the wrong kind
    #[error("The value for {key} is not {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
    },

    /// Snapshot I/O or decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Background work requested without an async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
