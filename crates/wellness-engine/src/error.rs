//! Engine error types.

use domain_sync::DomainError;
use mutation_queue::MutationError;
use quota_gate::{QuotaError, QuotaLimit, QuotaMetric};
use remote_store::StoreError;
use sync_config_and_utils::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// No user session; call `bootstrap` first.
    #[error("Not signed in")]
    NotSignedIn,

    /// The plan's quota is used up. Nothing was changed.
    #[error("Quota exceeded for {metric}: limit {limit}")]
    QuotaExceeded { limit: QuotaLimit, metric: QuotaMetric },

    /// Quota usage could not be read. Nothing was changed.
    #[error("Quota usage for {metric} is unavailable")]
    QuotaUnavailable { metric: QuotaMetric },

    #[error("Sync error: {0}")]
    Sync(#[from] DomainError),

    #[error("Quota error: {0}")]
    Quota(QuotaError),

    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),
}

impl From<MutationError> for EngineError {
    fn from(err: MutationError) -> Self {
        EngineError::Sync(err.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Sync(err.into())
    }
}

impl From<QuotaError> for EngineError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::Exceeded { limit, metric } => EngineError::QuotaExceeded { limit, metric },
            QuotaError::Unavailable { metric } => EngineError::QuotaUnavailable { metric },
            QuotaError::Storage(err) => EngineError::Sync(err),
            other => EngineError::Quota(other),
        }
    }
}

impl From<QuotaError<EngineError>> for EngineError {
    fn from(err: QuotaError<EngineError>) -> Self {
        match err {
            QuotaError::Action(err) => err,
            QuotaError::Exceeded { limit, metric } => EngineError::QuotaExceeded { limit, metric },
            QuotaError::Unavailable { metric } => EngineError::QuotaUnavailable { metric },
            QuotaError::Storage(err) => EngineError::Sync(err),
            QuotaError::Table(err) => EngineError::Config(err),
        }
    }
}

impl EngineError {
    /// Whether the error came from a quota denial.
    pub fn is_quota_denial(&self) -> bool {
        matches!(
            self,
            EngineError::QuotaExceeded { .. } | EngineError::QuotaUnavailable { .. }
        )
    }
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
