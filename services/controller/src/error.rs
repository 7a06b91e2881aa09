//! Error types for the reconciliation pipeline.

use iset_store::StoreError;
use thiserror::Error;

use crate::tree::TreeError;

/// Result type for pipeline operations.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that abort a reconciliation pass.
///
/// Transient errors (store conflicts, unavailability) resolve by re-running
/// the whole pass. Malformed-input errors are terminal for the current
/// spec: the same input would fail again, so callers should not blind-retry
/// them.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("malformed revision map: {0}")]
    MalformedRevisions(String),

    #[error("override templates claim {claimed} replicas but the set declares {declared}")]
    MisconfiguredReplicas { claimed: u32, declared: u32 },

    #[error("no update revision resolved for instance {0}")]
    MissingRevision(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// True when re-running the pass against fresh observed state can
    /// succeed. Malformed input fails the same way every pass.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(_) | Self::Tree(_) | Self::Internal(_) => true,
            Self::MalformedRevisions(_)
            | Self::MisconfiguredReplicas { .. }
            | Self::MissingRevision(_) => false,
        }
    }
}
