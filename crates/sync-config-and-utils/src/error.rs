//! Core error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A tuning value the queue cannot run with.
    #[error("Invalid sync tuning: {0}")]
    InvalidTuning(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No home directory to root `~/.wellness` in.
    #[error("Path error: {0}")]
    Path(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
