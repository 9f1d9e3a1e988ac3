//! Mock/reference detector.
//!
//! Deterministic, seeded synthetic candidates for testing the pipeline
//! end to end without model weights. Production backends implement the
//! same [`DetectorAdapter`] contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use evd_models::{BoundingBox, Candidate, Frame, TimeRange, VehicleType};

use crate::adapter::DetectorAdapter;
use crate::error::{DetectError, DetectResult};

const FRAME_SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;
const SEGMENT_SEED_MIX: u64 = 0xc2b2_ae3d_27d4_eb4f;

/// Seeded mock configuration.
#[derive(Debug, Clone)]
pub struct MockDetectorConfig {
    /// Seed shared by all calls; same seed means identical candidates.
    pub seed: u64,
    /// Emit a vehicle candidate on every n-th sampled frame.
    pub vehicle_period: u64,
    /// Probability that an audio segment carries a siren candidate.
    pub siren_rate: f64,
}

impl Default for MockDetectorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            vehicle_period: 3,
            siren_rate: 0.5,
        }
    }
}

enum Inner {
    Seeded(MockDetectorConfig),
    Scripted {
        /// Vehicle candidates keyed by frame index.
        vehicles: BTreeMap<u64, Vec<Candidate>>,
        /// Siren candidates, returned when their timestamp falls in the
        /// queried segment.
        sirens: Vec<Candidate>,
    },
    Unavailable(String),
}

/// Reference detector returning deterministic synthetic candidates.
pub struct MockDetector {
    inner: Inner,
}

impl MockDetector {
    /// Seeded mode: candidates derived from the seed and call inputs only.
    pub fn seeded(config: MockDetectorConfig) -> Self {
        Self {
            inner: Inner::Seeded(config),
        }
    }

    /// Scripted mode: exactly the given candidates, for scenario tests.
    pub fn scripted(vehicles: Vec<(u64, Candidate)>, sirens: Vec<Candidate>) -> Self {
        let mut by_frame: BTreeMap<u64, Vec<Candidate>> = BTreeMap::new();
        for (frame_index, candidate) in vehicles {
            by_frame.entry(frame_index).or_default().push(candidate);
        }
        Self {
            inner: Inner::Scripted {
                vehicles: by_frame,
                sirens,
            },
        }
    }

    /// Failing mode: every call raises `DetectorUnavailable`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            inner: Inner::Unavailable(reason.into()),
        }
    }
}

fn vehicle_type_for(slot: u64) -> VehicleType {
    match slot % 3 {
        0 => VehicleType::Ambulance,
        1 => VehicleType::PoliceCar,
        _ => VehicleType::FireTruck,
    }
}

#[async_trait]
impl DetectorAdapter for MockDetector {
    async fn detect_vehicles(&self, frame: &Frame) -> DetectResult<Vec<Candidate>> {
        match &self.inner {
            Inner::Unavailable(reason) => Err(DetectError::unavailable(reason.clone())),
            Inner::Scripted { vehicles, .. } => {
                Ok(vehicles.get(&frame.index).cloned().unwrap_or_default())
            }
            Inner::Seeded(config) => {
                if config.vehicle_period == 0 || frame.index % config.vehicle_period != 0 {
                    return Ok(Vec::new());
                }
                let mut rng =
                    StdRng::seed_from_u64(config.seed ^ frame.index.wrapping_mul(FRAME_SEED_MIX));
                let slot = frame.index / config.vehicle_period;
                let confidence = 0.60 + rng.random::<f64>() * 0.35;
                let bbox = BoundingBox::new(
                    rng.random_range(0..frame.width.max(2) / 2),
                    rng.random_range(0..frame.height.max(2) / 2),
                    frame.width / 2,
                    frame.height / 2,
                );
                Ok(vec![Candidate::vehicle(
                    vehicle_type_for(slot),
                    confidence,
                    frame.timestamp,
                    bbox,
                    frame.index * 2,
                )])
            }
        }
    }

    async fn detect_siren(&self, segment: TimeRange) -> DetectResult<Vec<Candidate>> {
        match &self.inner {
            Inner::Unavailable(reason) => Err(DetectError::unavailable(reason.clone())),
            // Half-open [start, end) so a siren on a segment boundary is
            // returned exactly once; zero-length segments (still images)
            // match on their single instant.
            Inner::Scripted { sirens, .. } => Ok(sirens
                .iter()
                .filter(|c| {
                    segment.contains(c.timestamp)
                        || (segment.duration() == 0.0 && c.timestamp == segment.start)
                })
                .cloned()
                .collect()),
            Inner::Seeded(config) => {
                let start_ms = (segment.start * 1000.0).round() as u64;
                let mut rng =
                    StdRng::seed_from_u64(config.seed ^ start_ms.wrapping_mul(SEGMENT_SEED_MIX));
                if !rng.random_bool(config.siren_rate.clamp(0.0, 1.0)) {
                    return Ok(Vec::new());
                }
                let confidence = 0.55 + rng.random::<f64>() * 0.40;
                let midpoint = (segment.start + segment.end) / 2.0;
                Ok(vec![Candidate::siren(confidence, midpoint, start_ms * 2 + 1)])
            }
        }
    }

    fn name(&self) -> &'static str {
        match self.inner {
            Inner::Seeded(_) => "mock_seeded",
            Inner::Scripted { .. } => "mock_scripted",
            Inner::Unavailable(_) => "mock_unavailable",
        }
    }
}
