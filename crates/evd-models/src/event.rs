//! Correlated emergency-vehicle events.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::vehicle::VehicleType;

/// Namespace for deterministic event ids. Re-running the correlator on
/// identical input must yield identical ids, so events use uuid v5 over
/// (kind, start_time, sequence) rather than random v4.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6e, 0x76, 0x64, 0x2d, 0x65, 0x76, 0x65, 0x6e, 0x74, 0x2d, 0x69, 0x64, 0x2d, 0x6e, 0x73,
    0x00,
]);

/// Unique identifier for a detection event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Derive a deterministic id from the event's identity within its job.
    pub fn derive(kind: VehicleType, start_time: f64, sequence: u32) -> Self {
        let name = format!("{}:{:.6}:{}", kind, start_time, sequence);
        Self(Uuid::new_v5(&EVENT_ID_NAMESPACE, name.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An emergency vehicle observed with an active siren over a span of
/// media time. Immutable once the correlator closes it; this is the
/// unit persisted as a "detection".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub event_id: EventId,
    /// Emergency-vehicle class of the correlated vehicle candidates.
    pub kind: VehicleType,
    /// Media offset where the event opened, in seconds.
    pub start_time: f64,
    /// Media offset of the last contributing candidate, in seconds.
    pub end_time: f64,
    /// Highest combined (vehicle x siren) confidence seen, geometric mean.
    pub peak_confidence: f64,
    /// Number of candidates that contributed to the event.
    pub supporting_candidate_count: u32,
}

impl Event {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    /// Whether this event overlaps another beyond the given gap.
    pub fn overlaps(&self, other: &Event, merge_gap: f64) -> bool {
        self.kind == other.kind
            && self.start_time < other.end_time + merge_gap
            && other.start_time < self.end_time + merge_gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_deterministic() {
        let a = EventId::derive(VehicleType::Ambulance, 1.0, 0);
        let b = EventId::derive(VehicleType::Ambulance, 1.0, 0);
        assert_eq!(a, b);

        let c = EventId::derive(VehicleType::Ambulance, 1.0, 1);
        assert_ne!(a, c);
    }

    #[test]
    fn test_event_duration() {
        let event = Event {
            event_id: EventId::derive(VehicleType::FireTruck, 2.0, 0),
            kind: VehicleType::FireTruck,
            start_time: 2.0,
            end_time: 3.5,
            peak_confidence: 0.8,
            supporting_candidate_count: 4,
        };
        assert!((event.duration() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_event_overlap() {
        let base = Event {
            event_id: EventId::derive(VehicleType::Ambulance, 1.0, 0),
            kind: VehicleType::Ambulance,
            start_time: 1.0,
            end_time: 2.0,
            peak_confidence: 0.9,
            supporting_candidate_count: 2,
        };
        let near = Event {
            event_id: EventId::derive(VehicleType::Ambulance, 2.5, 1),
            start_time: 2.5,
            end_time: 3.0,
            ..base.clone()
        };
        assert!(base.overlaps(&near, 1.0));
        assert!(!base.overlaps(&near, 0.1));
    }
}
