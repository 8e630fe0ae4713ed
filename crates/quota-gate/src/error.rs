//! Quota error types.

use crate::{QuotaLimit, QuotaMetric};
use domain_sync::DomainError;
use std::convert::Infallible;
use sync_config_and_utils::CoreError;
use thiserror::Error;

/// Errors from the quota gate. `E` is the error type of a guarded action.
#[derive(Error, Debug)]
pub enum QuotaError<E = Infallible> {
    /// The plan's limit for this period is used up. Raised before the
    /// guarded action runs.
    #[error("Quota exceeded for {metric}: limit {limit}")]
    Exceeded { limit: QuotaLimit, metric: QuotaMetric },

    /// Usage could not be read, so the action was denied.
    #[error("Quota usage for {metric} is unavailable")]
    Unavailable { metric: QuotaMetric },

    /// Reading or writing the usage document failed.
    #[error("Quota storage error: {0}")]
    Storage(#[from] DomainError),

    /// The quota table could not be loaded.
    #[error("Quota table error: {0}")]
    Table(#[from] CoreError),

    /// The guarded action itself failed.
    #[error(transparent)]
    Action(E),
}

/// Result type alias using QuotaError.
pub type QuotaResult<T> = Result<T, QuotaError>;
