//! Detector adapter contract.
//!
//! A uniform interface over the vehicle and siren detectors. Concrete
//! backends (mock, real inference) are interchangeable behind this trait
//! and selected at construction time; the backing model handle is owned
//! by the adapter, shared read-only across workers, and never mutated
//! after initialization.

use async_trait::async_trait;

use evd_models::{Candidate, Frame, TimeRange};

use crate::error::{DetectError, DetectResult};

/// Uniform detector interface.
///
/// Both operations are pure with respect to pipeline state: no shared
/// mutable state between calls beyond the internally owned, read-only
/// model handle. "No detection" is an empty vector, never an error.
#[async_trait]
pub trait DetectorAdapter: Send + Sync {
    /// Score one frame for emergency vehicles.
    async fn detect_vehicles(&self, frame: &Frame) -> DetectResult<Vec<Candidate>>;

    /// Score a time range of the media's audio for active sirens.
    async fn detect_siren(&self, segment: TimeRange) -> DetectResult<Vec<Candidate>>;

    /// Adapter name for logging.
    fn name(&self) -> &'static str;
}

/// Map a raw model score from its native range into [0, 1].
///
/// Adapters wrapping models with non-unit output ranges call this before
/// building candidates. A raw value outside the declared native range is
/// a contract violation.
pub fn normalize_confidence(raw: f64, native_min: f64, native_max: f64) -> DetectResult<f64> {
    if native_max <= native_min {
        return Err(DetectError::internal(format!(
            "invalid native range [{}, {}]",
            native_min, native_max
        )));
    }
    if raw < native_min || raw > native_max {
        return Err(DetectError::ConfidenceOutOfRange {
            label: "raw".to_string(),
            value: raw,
        });
    }
    Ok((raw - native_min) / (native_max - native_min))
}

/// Enforce the adapter contract on a batch of candidates.
///
/// The pipeline calls this after every adapter invocation so a
/// misbehaving backend fails the job instead of poisoning correlation.
pub fn validate_candidates(candidates: &[Candidate]) -> DetectResult<()> {
    for candidate in candidates {
        if !candidate.confidence_in_range() {
            return Err(DetectError::ConfidenceOutOfRange {
                label: candidate.label().to_string(),
                value: candidate.confidence,
            });
        }
    }
    Ok(())
}
