//! Mutation queue error types.

use remote_store::StoreError;
use thiserror::Error;

/// Why a queued write did not land.
///
/// Cloned to every caller folded into the failed write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The store refused the write. Not retried.
    #[error("Permission denied writing {key}: {source}")]
    PermissionDenied { key: String, source: StoreError },

    /// Transient failures on every attempt of the cycle.
    #[error("Write to {key} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        source: StoreError,
    },

    /// Any other non-retryable store error.
    #[error("Write to {key} rejected: {source}")]
    Rejected { key: String, source: StoreError },

    /// The queue went away before the write settled.
    #[error("Mutation queue dropped before the write settled")]
    Dropped,
}

impl MutationError {
    pub(crate) fn from_store(key: &str, attempts: u32, err: StoreError) -> Self {
        let key = key.to_string();
        match err {
            StoreError::PermissionDenied(_) => MutationError::PermissionDenied { key, source: err },
            StoreError::Transient(_) => MutationError::RetriesExhausted {
                key,
                attempts,
                source: err,
            },
            _ => MutationError::Rejected { key, source: err },
        }
    }

    /// The underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            MutationError::PermissionDenied { source, .. }
            | MutationError::RetriesExhausted { source, .. }
            | MutationError::Rejected { source, .. } => Some(source),
            MutationError::Dropped => None,
        }
    }
}

/// Result type alias using MutationError.
pub type MutationResult<T> = Result<T, MutationError>;
