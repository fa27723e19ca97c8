// src/tracker/session.rs
//! Mutable state of one recording

use crate::geo::{distance_km, Coordinate};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    /// Waiting for the user to confirm the stop; sampling continues
    Stopping,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Running => "Running",
            SessionStatus::Stopping => "Stopping",
        };
        f.write_str(name)
    }
}

/// Path and distance accumulators for the current recording.
///
/// Reset in place on every start. `generation` identifies the recording a
/// sampling tick belongs to; fixes from any other generation are dropped.
#[derive(Debug, Clone, Default)]
pub struct TrackingSession {
    status: SessionStatus,
    path: Vec<Coordinate>,
    cumulative_distance_km: f64,
    session_start_epoch_ms: Option<i64>,
    generation: u64,
}

impl TrackingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Recorded fixes, oldest first
    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn cumulative_distance_km(&self) -> f64 {
        self.cumulative_distance_km
    }

    pub fn session_start_epoch_ms(&self) -> Option<i64> {
        self.session_start_epoch_ms
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.session_start_epoch_ms
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Running or waiting for stop confirmation
    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Running | SessionStatus::Stopping)
    }

    /// Clear the accumulators and enter `Running`. Returns the new generation.
    pub fn begin(&mut self, now_epoch_ms: i64) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.status = SessionStatus::Running;
        self.path.clear();
        self.cumulative_distance_km = 0.0;
        self.session_start_epoch_ms = Some(now_epoch_ms);
        self.generation
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    /// Back to `Idle` with empty accumulators
    pub fn reset(&mut self) {
        self.status = SessionStatus::Idle;
        self.path.clear();
        self.cumulative_distance_km = 0.0;
        self.session_start_epoch_ms = None;
    }

    /// Append a fix taken by a tick of `generation`.
    ///
    /// The segment from the current last point is added to the distance. Returns
    /// false, leaving everything untouched, if the tick belongs to a recording
    /// that is no longer active.
    pub fn apply_fix(&mut self, generation: u64, fix: Coordinate) -> bool {
        if !self.is_active() || generation != self.generation {
            return false;
        }

        if let Some(last) = self.path.last() {
            let segment = distance_km(*last, fix);
            if segment.is_finite() {
                self.cumulative_distance_km += segment.max(0.0);
            }
        }
        self.path.push(fix);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_is_idle_and_empty() {
        let session = TrackingSession::new();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.path().is_empty());
        assert_eq!(session.cumulative_distance_km(), 0.0);
        assert!(session.session_start_epoch_ms().is_none());
    }

    #[test]
    fn test_idle_session_ignores_fixes() {
        let mut session = TrackingSession::new();
        assert!(!session.apply_fix(0, Coordinate::new(1.0, 1.0)));
        assert!(session.path().is_empty());
    }

    #[test]
    fn test_distance_is_sum_of_segments() {
        let mut session = TrackingSession::new();
        let generation = session.begin(1_700_000_000_000);

        let fixes = [
            Coordinate::new(55.0, 12.0),
            Coordinate::new(55.001, 12.0),
            Coordinate::new(55.001, 12.002),
            Coordinate::new(55.001, 12.002),
            Coordinate::new(54.999, 12.001),
        ];

        let mut previous_total = 0.0;
        for fix in fixes {
            assert!(session.apply_fix(generation, fix));
            assert!(session.cumulative_distance_km() >= previous_total);
            previous_total = session.cumulative_distance_km();
        }

        let expected: f64 = fixes.windows(2).map(|w| distance_km(w[0], w[1])).sum();
        assert!((session.cumulative_distance_km() - expected).abs() < 1e-12);
        assert_eq!(session.path(), &fixes);
    }

    #[test]
    fn test_stale_generation_dropped() {
        let mut session = TrackingSession::new();
        let old = session.begin(0);
        session.reset();
        let current = session.begin(1);

        assert!(!session.apply_fix(old, Coordinate::new(0.0, 0.0)));
        assert!(session.path().is_empty());
        assert!(session.apply_fix(current, Coordinate::new(0.0, 0.0)));
        assert_eq!(session.path().len(), 1);
    }

    #[test]
    fn test_stopping_still_records() {
        let mut session = TrackingSession::new();
        let generation = session.begin(0);
        session.set_status(SessionStatus::Stopping);
        assert!(session.apply_fix(generation, Coordinate::new(0.0, 0.0)));
    }

    #[test]
    fn test_begin_clears_previous_run() {
        let mut session = TrackingSession::new();
        let generation = session.begin(0);
        session.apply_fix(generation, Coordinate::new(0.0, 0.0));
        session.apply_fix(generation, Coordinate::new(0.0, 1.0));

        session.begin(5_000);
        assert!(session.path().is_empty());
        assert_eq!(session.cumulative_distance_km(), 0.0);
        assert_eq!(session.session_start_epoch_ms(), Some(5_000));
        assert!(session.started_at().is_some());
    }
}
