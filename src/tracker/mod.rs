// src/tracker/mod.rs
//! Live run tracking: session lifecycle, periodic sampling and snapshots

pub mod session;

pub use session::{SessionStatus, TrackingSession};

use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
    identity::Identity,
    location::{AccuracyTier, PositionSampler},
    path::{smooth_path, DEFAULT_POINTS_PER_SEGMENT},
    recorder::{RunRecord, RunRecorder, RunSummary},
    stopwatch::Stopwatch,
    store::RunStore,
};
use chrono::Utc;
use serde::Serialize;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Timing and rendering knobs for a tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Time between position samples
    pub sample_interval: Duration,
    /// Time between elapsed-time refreshes of the snapshot
    pub display_refresh: Duration,
    pub accuracy: AccuracyTier,
    pub points_per_segment: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            display_refresh: Duration::from_secs(1),
            accuracy: AccuracyTier::BestForNavigation,
            points_per_segment: DEFAULT_POINTS_PER_SEGMENT,
        }
    }
}

impl TrackerSettings {
    /// Timer periods must be non-zero
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            return Err(TrackerError::Config("sample interval must be positive".to_string()));
        }
        if self.display_refresh.is_zero() {
            return Err(TrackerError::Config("display refresh must be positive".to_string()));
        }
        Ok(())
    }
}

/// Read-only view of the session for rendering
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Snapshot {
    pub status: SessionStatus,
    pub path: Vec<Coordinate>,
    pub cumulative_distance_km: f64,
    pub elapsed_ms: u64,
    pub smoothed_path: Vec<Coordinate>,
}

struct SessionState {
    session: TrackingSession,
    stopwatch: Stopwatch,
}

/// State shared between the tracker and its background tasks
struct Shared {
    state: Mutex<SessionState>,
    updates: watch::Sender<Snapshot>,
    points_per_segment: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_of(&self, state: &SessionState) -> Snapshot {
        Snapshot {
            status: state.session.status(),
            path: state.session.path().to_vec(),
            cumulative_distance_km: state.session.cumulative_distance_km(),
            elapsed_ms: state.stopwatch.elapsed(),
            smoothed_path: smooth_path(state.session.path(), self.points_per_segment),
        }
    }

    /// Publish while the state lock is held so snapshots go out in mutation order
    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(self.snapshot_of(state));
    }

    fn apply_fix(&self, generation: u64, fix: Coordinate) -> bool {
        let mut state = self.lock();
        let applied = state.session.apply_fix(generation, fix);
        if applied {
            self.publish(&state);
        }
        applied
    }

    /// Republish for a clock tick; false once the recording is over
    fn refresh(&self, generation: u64) -> bool {
        let state = self.lock();
        if !state.session.is_active() || state.session.generation() != generation {
            return false;
        }
        self.publish(&state);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock();
        state.session.is_active() && state.session.generation() == generation
    }
}

/// Owns one tracking session and drives it from a position sampler.
///
/// Lifecycle calls take `&mut self` and are therefore never interleaved. The
/// sampling task only touches the session under the state lock, and only for
/// the generation it was started with.
pub struct RunTracker {
    shared: Arc<Shared>,
    sampler: Arc<dyn PositionSampler>,
    identity: Arc<dyn Identity>,
    recorder: RunRecorder,
    settings: TrackerSettings,
    sampling: Option<JoinHandle<()>>,
    clock: Option<JoinHandle<()>>,
}

impl RunTracker {
    pub fn new(
        sampler: Arc<dyn PositionSampler>,
        identity: Arc<dyn Identity>,
        store: Arc<dyn RunStore>,
        settings: TrackerSettings,
    ) -> Self {
        let (updates, _) = watch::channel(Snapshot::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                session: TrackingSession::new(),
                stopwatch: Stopwatch::new(),
            }),
            updates,
            points_per_segment: settings.points_per_segment,
        });

        Self {
            shared,
            sampler,
            identity,
            recorder: RunRecorder::new(store),
            settings,
            sampling: None,
            clock: None,
        }
    }

    /// Receive a fresh snapshot after every tick, clock refresh and transition.
    /// Don't hold a borrow of the receiver for long, it blocks publishing.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.shared.lock();
        self.shared.snapshot_of(&state)
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().session.status()
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn sampler_name(&self) -> &str {
        self.sampler.name()
    }

    /// Start a new recording.
    ///
    /// Fails with `Config` for zero timer periods. Asks the sampler for
    /// permission first; a refusal is returned as is and the session stays `Idle`.
    pub async fn start(&mut self) -> Result<()> {
        let from = self.status();
        if from != SessionStatus::Idle {
            return Err(TrackerError::InvalidTransition { from, action: "start" });
        }
        self.settings.validate()?;

        if let Err(e) = self.sampler.request_permission().await {
            warn!("Not starting, {} refused: {}", self.sampler.name(), e);
            return Err(e);
        }

        self.stop_tasks();

        let generation = {
            let mut state = self.shared.lock();
            let generation = state.session.begin(Utc::now().timestamp_millis());
            state.stopwatch.reset();
            state.stopwatch.start();
            self.shared.publish(&state);
            generation
        };

        self.sampling = Some(tokio::spawn(sampling_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.sampler),
            generation,
            self.settings.sample_interval,
            self.settings.accuracy,
        )));
        self.clock = Some(tokio::spawn(clock_loop(
            Arc::clone(&self.shared),
            generation,
            self.settings.display_refresh,
        )));

        info!("Run started (source: {})", self.sampler.name());
        Ok(())
    }

    /// Ask to stop. Sampling keeps going until the stop is confirmed or cancelled.
    pub fn request_stop(&mut self) -> Result<()> {
        self.transition(SessionStatus::Running, SessionStatus::Stopping, "request stop")
    }

    /// Keep running after all
    pub fn cancel_stop(&mut self) -> Result<()> {
        self.transition(SessionStatus::Stopping, SessionStatus::Running, "cancel stop")
    }

    fn transition(&mut self, from: SessionStatus, to: SessionStatus, action: &'static str) -> Result<()> {
        let mut state = self.shared.lock();
        let current = state.session.status();
        if current != from {
            return Err(TrackerError::InvalidTransition { from: current, action });
        }
        state.session.set_status(to);
        self.shared.publish(&state);
        debug!("Session {} -> {}", from, to);
        Ok(())
    }

    /// Finish the recording and hand the run record to storage.
    ///
    /// The session is back to `Idle` with empty accumulators when this returns,
    /// whether or not a record could be made. Without a signed-in user the run
    /// is discarded with `NotAuthenticated`. Storage is written in the
    /// background; a failed write is only logged.
    pub async fn confirm_stop(&mut self) -> Result<RunRecord> {
        let summary = {
            let mut state = self.shared.lock();
            let from = state.session.status();
            if from != SessionStatus::Stopping {
                return Err(TrackerError::InvalidTransition { from, action: "confirm stop" });
            }

            state.stopwatch.stop();
            let summary = RunSummary {
                distance_km: state.session.cumulative_distance_km(),
                elapsed_ms: state.stopwatch.elapsed(),
                points: state.session.path().len(),
                };
            state.session.reset();
            state.stopwatch.reset();
            self.shared.publish(&state);
            summary
        };
        self.stop_tasks();

        info!(
            "Run stopped: {:.2} km in {} ms over {} points",
            summary.distance_km, summary.elapsed_ms, summary.points
        );

        let user_id = self.identity.current_user_id();
        let username = match &user_id {
            Some(id) => match self.identity.current_username(id).await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Could not resolve username for {}: {}", id, e);
                    id.clone()
                }
            },
            None => String::new(),
        };

        let record = match self.recorder.finalize(&summary, user_id.as_deref(), &username) {
            Ok(record) => record,
            Err(e) => {
                warn!("Run discarded: {}", e);
                return Err(e);
            }
        };

        // Fire and forget; the write reports its own outcome
        drop(self.recorder.hand_off(record.clone()));
        Ok(record)
    }

    /// Request and confirm in one go
    pub async fn stop(&mut self) -> Result<RunRecord> {
        if self.status() == SessionStatus::Running {
            self.request_stop()?;
        }
        self.confirm_stop().await
    }

    fn stop_tasks(&mut self) {
        if let Some(task) = self.sampling.take() {
            task.abort();
        }
        if let Some(task) = self.clock.take() {
            task.abort();
        }
    }
}

impl Drop for RunTracker {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

/// One fix per tick, one tick at a time
async fn sampling_loop(
    shared: Arc<Shared>,
    sampler: Arc<dyn PositionSampler>,
    generation: u64,
    period: Duration,
    accuracy: AccuracyTier,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !shared.is_current(generation) {
            break;
        }

        match sampler.current_fix(accuracy).await {
            Ok(fix) => {
                if !shared.apply_fix(generation, fix) {
                    debug!("Dropping fix from a finished recording");
                    break;
                }
            }
            Err(e) if e.is_transient() => debug!("No fix this tick: {}", e),
            Err(e) => warn!("Fix failed, skipping tick: {}", e),
        }
    }
}

/// Keeps the elapsed time moving in snapshots between fixes
async fn clock_loop(shared: Arc<Shared>, generation: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !shared.refresh(generation) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{identity::StaticIdentity, location::ReplaySampler, store::MemoryRunStore};

    fn tracker(sampler: ReplaySampler) -> RunTracker {
        RunTracker::new(
            Arc::new(sampler),
            Arc::new(StaticIdentity::signed_in("u1", "alice")),
            Arc::new(MemoryRunStore::new()),
            TrackerSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_guards() {
        let mut tracker = tracker(ReplaySampler::from_coordinates([Coordinate::new(0.0, 0.0)]));

        assert!(matches!(
            tracker.request_stop(),
            Err(TrackerError::InvalidTransition { from: SessionStatus::Idle, .. })
        ));
        assert!(tracker.cancel_stop().is_err());
        assert!(tracker.confirm_stop().await.is_err());

        tracker.start().await.unwrap();
        assert!(matches!(
            tracker.start().await,
            Err(TrackerError::InvalidTransition { from: SessionStatus::Running, .. })
        ));
        assert!(tracker.confirm_stop().await.is_err());
        assert_eq!(tracker.status(), SessionStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_stays_idle() {
        let mut tracker = tracker(ReplaySampler::denying());

        let err = tracker.start().await.unwrap_err();
        assert!(matches!(err, TrackerError::PermissionDenied(_)));
        assert_eq!(tracker.status(), SessionStatus::Idle);
        assert!(tracker.snapshot().path.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_periods_rejected_at_start() {
        let zero_sampling = TrackerSettings {
            sample_interval: Duration::ZERO,
            ..TrackerSettings::default()
        };
        let zero_refresh = TrackerSettings {
            display_refresh: Duration::ZERO,
            ..TrackerSettings::default()
        };

        for settings in [zero_sampling, zero_refresh] {
            let sampler = Arc::new(ReplaySampler::from_coordinates([Coordinate::new(0.0, 0.0)]));
            let mut tracker = RunTracker::new(
                sampler.clone(),
                Arc::new(StaticIdentity::signed_in("u1", "alice")),
                Arc::new(MemoryRunStore::new()),
                settings,
            );

            let err = tracker.start().await.unwrap_err();
            assert!(matches!(err, TrackerError::Config(_)));
            assert_eq!(tracker.status(), SessionStatus::Idle);
            assert!(tracker.sampling.is_none());

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(sampler.calls(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_publish() {
        let mut tracker = tracker(ReplaySampler::from_coordinates([Coordinate::new(0.0, 0.0)]));
        let mut rx = tracker.subscribe();

        tracker.start().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, SessionStatus::Running);

        tracker.request_stop().unwrap();
        assert_eq!(rx.borrow_and_update().status, SessionStatus::Stopping);
    }
}
