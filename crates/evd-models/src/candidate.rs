//! Detector candidates and time ranges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::vehicle::{BoundingBox, VehicleType};

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Vehicle,
    Siren,
}

/// A single candidate detection, produced by a detector adapter call
/// and consumed only by the correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    pub kind: CandidateKind,
    /// Vehicle subtype for vehicle candidates; `None` for siren candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    /// Normalized confidence in [0, 1]. The adapter normalizes whatever
    /// native range the backing model emits; an out-of-range value is a
    /// contract violation the pipeline rejects, never clamps.
    pub confidence: f64,
    /// Offset from media start, in seconds.
    pub timestamp: f64,
    /// Bounding region (vehicle candidates only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Monotonically increasing ordinal assigned by the adapter, used
    /// as the final tie-breaker in the correlator.
    pub index: u64,
}

impl Candidate {
    /// Build a vehicle candidate.
    pub fn vehicle(
        vehicle_type: VehicleType,
        confidence: f64,
        timestamp: f64,
        bounding_box: BoundingBox,
        index: u64,
    ) -> Self {
        Self {
            kind: CandidateKind::Vehicle,
            vehicle_type: Some(vehicle_type),
            confidence,
            timestamp,
            bounding_box: Some(bounding_box),
            index,
        }
    }

    /// Build a siren candidate.
    pub fn siren(confidence: f64, timestamp: f64, index: u64) -> Self {
        Self {
            kind: CandidateKind::Siren,
            vehicle_type: None,
            confidence,
            timestamp,
            bounding_box: None,
            index,
        }
    }

    /// Whether the confidence honors the adapter contract.
    pub fn confidence_in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }

    /// Candidate label for logging ("ambulance", "siren", ...).
    pub fn label(&self) -> &'static str {
        match self.vehicle_type {
            Some(vt) => vt.as_str(),
            None => "siren",
        }
    }
}

/// Half-open time range within the media, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }
}
