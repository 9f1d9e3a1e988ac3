//! Detector error types.

use thiserror::Error;

/// Result type for detector operations.
pub type DetectResult<T> = Result<T, DetectError>;

/// Errors raised at the detector adapter boundary.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Backing model missing or broken. Fatal for the owning job.
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// A detector emitted a confidence outside [0, 1]. The contract
    /// requires the adapter to normalize; the pipeline rejects rather
    /// than clamps.
    #[error("detector contract violation: {label} confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { label: String, value: f64 },

    #[error("internal detector error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::DetectorUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
