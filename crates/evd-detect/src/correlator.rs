//! Candidate correlation.
//!
//! Fuses the vehicle and siren candidate streams into emergency-vehicle
//! events over a sliding time window. Pure in-memory computation, no
//! suspension points; the scheduler drives it between detector calls.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use evd_models::{Candidate, CandidateKind, Event, EventId, VehicleType};

/// Correlation tuning.
///
/// Defaults are starting points, not calibrated constants: window width,
/// thresholds and merge gap should be tuned against footage for the
/// deployment.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    /// Sliding window width `W` in seconds: a vehicle and a siren
    /// candidate correlate when their timestamps are within `W`.
    pub window_secs: f64,
    /// Minimum vehicle candidate confidence considered for correlation.
    pub vehicle_threshold: f64,
    /// Minimum siren candidate confidence considered for correlation.
    pub siren_threshold: f64,
    /// Matches closer than this gap to an open event of the same kind
    /// extend it instead of opening a new one.
    pub merge_gap_secs: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            window_secs: 2.0,
            vehicle_threshold: 0.5,
            siren_threshold: 0.5,
            merge_gap_secs: 1.0,
        }
    }
}

/// An event still accumulating matches.
#[derive(Debug, Clone)]
struct OpenEvent {
    kind: VehicleType,
    start_time: f64,
    end_time: f64,
    peak_confidence: f64,
    supporting_candidate_count: u32,
    /// Order the event was opened in, for deterministic output ordering.
    opened_seq: u32,
}

impl OpenEvent {
    fn close(self, sequence: u32) -> Event {
        Event {
            event_id: EventId::derive(self.kind, self.start_time, sequence),
            kind: self.kind,
            start_time: self.start_time,
            end_time: self.end_time,
            peak_confidence: self.peak_confidence,
            supporting_candidate_count: self.supporting_candidate_count,
        }
    }
}

/// Sliding-window correlator.
///
/// Feed candidates in non-decreasing stream order via [`Correlator::push`],
/// then take the closed, time-ordered events with [`Correlator::finish`].
/// Deterministic: identical input yields identical output, including
/// event ids and tie-breaks.
pub struct Correlator {
    config: CorrelatorConfig,
    /// Thresholded vehicle candidates still inside the window.
    vehicles: VecDeque<Candidate>,
    /// Thresholded siren candidates still inside the window.
    sirens: VecDeque<Candidate>,
    open: HashMap<VehicleType, OpenEvent>,
    closed: Vec<OpenEvent>,
    /// Highest candidate timestamp observed so far.
    watermark: f64,
    opened_count: u32,
}

impl Correlator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            config,
            vehicles: VecDeque::new(),
            sirens: VecDeque::new(),
            open: HashMap::new(),
            closed: Vec::new(),
            watermark: f64::NEG_INFINITY,
            opened_count: 0,
        }
    }

    /// Ingest one candidate.
    ///
    /// Candidates below their threshold never correlate and are dropped
    /// here. A vehicle candidate is matched against every buffered siren
    /// within the window and vice versa, so a match forms no matter which
    /// stream delivers its half first.
    pub fn push(&mut self, candidate: &Candidate) {
        self.advance(candidate.timestamp);

        match candidate.kind {
            CandidateKind::Vehicle => {
                if candidate.confidence < self.config.vehicle_threshold {
                    return;
                }
                let matches = self.window_matches(&self.sirens, candidate.timestamp);
                for siren in matches {
                    self.record_match(candidate, &siren);
                }
                self.vehicles.push_back(candidate.clone());
            }
            CandidateKind::Siren => {
                if candidate.confidence < self.config.siren_threshold {
                    return;
                }
                let matches = self.window_matches(&self.vehicles, candidate.timestamp);
                for vehicle in matches {
                    self.record_match(&vehicle, candidate);
                }
                self.sirens.push_back(candidate.clone());
            }
        }
    }

    /// Close everything and return the final, time-ordered event list.
    pub fn finish(mut self) -> Vec<Event> {
        let mut remaining: Vec<OpenEvent> = self.open.drain().map(|(_, e)| e).collect();
        remaining.sort_by_key(|e| e.opened_seq);
        self.closed.extend(remaining);

        self.closed.sort_by(|a, b| {
            a.start_time
                .partial_cmp(&b.start_time)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.opened_seq.cmp(&b.opened_seq))
        });

        let events: Vec<Event> = self
            .closed
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.close(i as u32))
            .collect();

        debug!(count = events.len(), "Correlator produced events");
        events
    }

    /// Candidates from `buffer` within the window of `timestamp`, ordered
    /// for deterministic processing: by timestamp, then higher confidence
    /// first, then lowest index.
    fn window_matches(&self, buffer: &VecDeque<Candidate>, timestamp: f64) -> Vec<Candidate> {
        let mut matches: Vec<Candidate> = buffer
            .iter()
            .filter(|c| (c.timestamp - timestamp).abs() <= self.config.window_secs)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.index.cmp(&b.index))
        });
        matches
    }

    /// Open or extend an event for a correlated (vehicle, siren) pair.
    fn record_match(&mut self, vehicle: &Candidate, siren: &Candidate) {
        let Some(kind) = vehicle.vehicle_type else {
            return;
        };
        let start = vehicle.timestamp.min(siren.timestamp);
        let end = vehicle.timestamp.max(siren.timestamp);
        // Both signals must be strong: geometric mean, so a weak half
        // cannot hide behind a strong one.
        let combined = (vehicle.confidence * siren.confidence).sqrt();

        if let Some(event) = self.open.get_mut(&kind) {
            if start <= event.end_time + self.config.merge_gap_secs {
                event.end_time = event.end_time.max(end);
                event.peak_confidence = event.peak_confidence.max(combined);
                event.supporting_candidate_count += 1;
                return;
            }
        }

        // Too far from the open event of this kind (or none open): close
        // it and start fresh.
        if let Some(stale) = self.open.remove(&kind) {
            self.closed.push(stale);
        }
        let opened_seq = self.opened_count;
        self.opened_count += 1;
        self.open.insert(
            kind,
            OpenEvent {
                kind,
                start_time: start,
                end_time: end,
                peak_confidence: combined,
                supporting_candidate_count: 2,
                opened_seq,
            },
        );
    }

    /// Move stream time forward: prune buffered candidates that fell out
    /// of the window and close open events nothing can extend anymore.
    fn advance(&mut self, timestamp: f64) {
        if timestamp <= self.watermark {
            return;
        }
        self.watermark = timestamp;
        let horizon = timestamp - self.config.window_secs;

        while matches!(self.vehicles.front(), Some(c) if c.timestamp < horizon) {
            self.vehicles.pop_front();
        }
        while matches!(self.sirens.front(), Some(c) if c.timestamp < horizon) {
            self.sirens.pop_front();
        }

        let stale: Vec<VehicleType> = self
            .open
            .iter()
            .filter(|(_, e)| timestamp - e.end_time > self.config.window_secs)
            .map(|(k, _)| *k)
            .collect();
        for kind in stale {
            if let Some(event) = self.open.remove(&kind) {
                self.closed.push(event);
            }
        }
    }
}
