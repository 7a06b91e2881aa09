//! Error types for store operations.

use thiserror::Error;

/// Errors returned by an object store.
///
/// All variants except `Malformed` are transient from the pipeline's point
/// of view: the caller re-runs the whole pass rather than retrying a single
/// operation.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Create of an object that already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Stale write: the resource version did not match the stored one.
    #[error("conflict on {key}: stale resource version {given}, current {current}")]
    Conflict {
        key: String,
        given: u64,
        current: u64,
    },

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The object body could not be (de)serialized.
    #[error("malformed object: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}
