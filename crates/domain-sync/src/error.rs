//! Domain sync error types.

use crate::Domain;
use mutation_queue::MutationError;
use remote_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Direct store access failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A queued write did not land.
    #[error("Sync failed: {0}")]
    Mutation(#[from] MutationError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored document does not have the expected layout.
    #[error("Malformed {domain} document: {reason}")]
    Malformed { domain: Domain, reason: String },
}

/// Result type alias using DomainError.
pub type DomainResult<T> = Result<T, DomainError>;
