use crate::clock::ClockError;
use thiserror::Error;

/// Errors surfaced while routing a job.
///
/// Store failures are never swallowed: a submission that cannot be recorded
/// fails instead of silently keeping its original queue.
#[derive(Debug, Error)]
pub enum ThrottleError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<redis::RedisError> for ThrottleError {
    fn from(err: redis::RedisError) -> Self {
        ThrottleError::Store(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ThrottleError {
    fn from(err: validator::ValidationErrors) -> Self {
        ThrottleError::Validation(err.to_string())
    }
}

pub type ThrottleResult<T> = Result<T, ThrottleError>;
