//! Shared data models for the EVD backend.
//!
//! This crate provides Serde-serializable types for:
//! - Detection jobs and their lifecycle
//! - Candidates produced by detectors
//! - Correlated emergency-vehicle events
//! - Decoded video frames and time ranges

pub mod candidate;
pub mod event;
pub mod frame;
pub mod job;
pub mod vehicle;

// Re-export common types
pub use candidate::{Candidate, CandidateKind, TimeRange};
pub use event::{Event, EventId};
pub use frame::Frame;
pub use job::{Job, JobId, JobStatus, TransitionError};
pub use vehicle::{BoundingBox, VehicleType};
