// src/lib.rs
//! Run Tracker Library
//!
//! Records running sessions from a GPS source: samples position on a timer,
//! accumulates great-circle distance and elapsed time, smooths the path for
//! display and stores a run record when the session is stopped.

pub mod config;
pub mod display;
pub mod error;
pub mod geo;
pub mod identity;
pub mod leaderboard;
pub mod location;
pub mod path;
pub mod recorder;
pub mod stopwatch;
pub mod store;
pub mod tracker;

// Re-export main types for convenience
pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use geo::{distance_km, interpolate, Coordinate};
pub use identity::{DirectoryIdentity, Identity, StaticIdentity, UsernameDirectory};
pub use location::{AccuracyTier, FixSource, PositionSampler};
pub use path::smooth_path;
pub use recorder::{RunRecord, RunRecorder};
pub use stopwatch::Stopwatch;
pub use store::{JsonFileRunStore, MemoryRunStore, RunFilter, RunStore};
pub use tracker::{RunTracker, SessionStatus, Snapshot, TrackerSettings};
