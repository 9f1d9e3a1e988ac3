//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("media error: {0}")]
    Media(#[from] evd_media::MediaError),

    #[error("detector error: {0}")]
    Detect(#[from] evd_detect::DetectError),

    #[error("store error: {0}")]
    Store(#[from] evd_store::StoreError),

    #[error("pre-flight validation failed: {0}")]
    Preflight(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("job exceeded {0:?} wall-clock budget")]
    Timeout(Duration),
}

impl WorkerError {
    /// Pipeline stage that raised the error, for error_detail reporting.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::Media(_) => "frame_source",
            WorkerError::Detect(_) => "detector",
            WorkerError::Store(_) => "store",
            WorkerError::Preflight(_) => "preflight",
            WorkerError::Cancelled | WorkerError::Timeout(_) => "scheduler",
        }
    }

    /// Error detail string recorded on the failed job (cause + stage).
    pub fn error_detail(&self) -> String {
        match self {
            WorkerError::Cancelled => "cancelled".to_string(),
            WorkerError::Timeout(budget) => {
                format!("cancelled: exceeded {:.0}s wall-clock budget", budget.as_secs_f64())
            }
            other => format!("{}: {}", other.stage(), other),
        }
    }

    /// Whether this is a cooperative-cancellation outcome rather than a
    /// pipeline fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, WorkerError::Cancelled | WorkerError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_detail() {
        assert_eq!(WorkerError::Cancelled.error_detail(), "cancelled");
        assert!(WorkerError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_timeout_follows_cancellation_path() {
        let err = WorkerError::Timeout(Duration::from_secs(600));
        assert!(err.is_cancellation());
        assert!(err.error_detail().starts_with("cancelled"));
    }

    #[test]
    fn test_media_error_cites_stage() {
        let err = WorkerError::Media(evd_media::MediaError::unreadable("corrupt header"));
        assert!(err.error_detail().starts_with("frame_source:"));
        assert!(err.error_detail().contains("corrupt header"));
    }
}
