//! Remote store error taxonomy.

use thiserror::Error;

/// Errors surfaced by a [`RemoteStore`](crate::RemoteStore).
///
/// Only [`StoreError::Transient`] is worth retrying; everything else is
/// surfaced to the caller immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Network blip, timeout, contention or backend overload.
    #[error("Transient store error: {0}")]
    Transient(String),

    /// The caller is not allowed to touch this document.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The document does not exist (only `update` reports this).
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether the mutation queue should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    /// Map a backend status code (`permission-denied`, `unavailable`, ...)
    /// onto the taxonomy.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "permission-denied" | "unauthenticated" => StoreError::PermissionDenied(message),
            "not-found" => StoreError::NotFound(message),
            "invalid-argument" | "data-loss" | "out-of-range" => {
                StoreError::Serialization(message)
            }
            // unavailable, deadline-exceeded, aborted, internal, resource-exhausted, ...
            _ => StoreError::Transient(message),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
