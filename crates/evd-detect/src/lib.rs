//! Detection layer for the EVD pipeline.
//!
//! This crate provides:
//! - The [`DetectorAdapter`] contract wrapping vehicle and siren
//!   detectors behind a uniform, pluggable interface
//! - A deterministic seeded mock/reference detector
//! - The [`Correlator`], which fuses candidate streams into
//!   emergency-vehicle events

pub mod adapter;
pub mod correlator;
pub mod error;
pub mod mock;

pub use adapter::{normalize_confidence, validate_candidates, DetectorAdapter};
pub use correlator::{Correlator, CorrelatorConfig};
pub use error::{DetectError, DetectResult};
pub use mock::{MockDetector, MockDetectorConfig};
