//! Store error types.

use thiserror::Error;

use evd_models::{JobId, TransitionError};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised at the job store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Claim or status query on an unknown id. Reported to the caller,
    /// never fatal to the scheduler.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Persistence collaborator unreachable. The scheduler retries these
    /// with backoff before failing the job.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }
}
