use thiserror::Error;

use studyhub_shared::ValidationError;
use studyhub_store::StoreError;

/// Failures surfaced by every core operation.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Unknown id, or a record the caller may not know exists.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The write would duplicate a unique record.
    #[error("{0}")]
    Conflict(String),

    /// The caller is known but lacks the relationship or right required.
    #[error("{0}")]
    Forbidden(String),

    /// Missing, unknown, or expired credentials.
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    /// Unexpected storage failure. Fatal to the request.
    #[error("Storage error: {0}")]
    Storage(StoreError),

    /// Unexpected failure outside storage (e.g. password hashing).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CoreError::NotFound("Record"),
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            other => CoreError::Storage(other),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
