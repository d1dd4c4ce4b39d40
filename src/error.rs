//! Error types for lidar-db
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Two layers:
//! - [`StoreError`]: what a [`CaptureStore`](crate::store::CaptureStore) reports
//! - [`Error`]: what the aggregation service returns, with the failing
//!   operation and natural key attached

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for persistence port calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a persistence backend.
///
/// "Not found" is never a `StoreError`; lookups return `Ok(None)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint on a natural key rejected the insert
    #[error("duplicate key in {collection}: {key}")]
    DuplicateKey {
        /// Collection that owns the constraint
        collection: &'static str,
        /// Rendered natural key
        key: String,
    },

    /// The store did not answer within the configured bound
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The store is unreachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this failure is a natural-key conflict.
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

/// lidar-db error types
#[derive(Error, Debug)]
pub enum Error {
    /// A store query failed or timed out
    #[error("lookup failed during {operation} ({key}): {source}")]
    Lookup {
        /// Service operation that issued the query
        operation: &'static str,
        /// Natural key being resolved
        key: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// A store write failed (key conflicts excluded)
    #[error("persist failed during {operation} ({key}): {source}")]
    Persist {
        /// Service operation that issued the write
        operation: &'static str,
        /// Natural key being written
        key: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// A concurrent writer won a natural-key race and its record could not be re-resolved
    #[error("{record} with key {key} was created concurrently but could not be re-read\nRe-run the ingestion step to resume")]
    Duplicate {
        /// Record kind ("experiment", "measurement", "processing result")
        record: &'static str,
        /// Rendered natural key
        key: String,
    },

    /// Empty or shape-mismatched measurement set
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Caller supplied unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The store failure behind a `Lookup` or `Persist` error, if any.
    #[must_use]
    pub const fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::Lookup { source, .. } | Self::Persist { source, .. } => Some(source),
            _ => None,
        }
    }
}
