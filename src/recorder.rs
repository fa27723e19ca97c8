// src/recorder.rs
//! Turning a finished session into a run record and handing it to storage

use crate::{
    error::{Result, TrackerError},
    stopwatch::format_duration,
    store::RunStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A completed run as it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub user_id: String,
    /// Copied from the directory at write time
    pub username: String,
    pub date: DateTime<Utc>,
    /// Kilometres, rounded to 2 decimals
    #[serde(rename = "distance")]
    pub distance_km: f64,
    pub duration: String,
    pub elapsed_seconds: u64,
    /// km/h, rounded to 2 decimals
    #[serde(rename = "averageSpeed")]
    pub average_speed_kmh: f64,
}

/// Final values of a session at the moment it was stopped
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub distance_km: f64,
    pub elapsed_ms: u64,
    pub points: usize,
}

impl RunSummary {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// Average speed in km/h; zero when no time has elapsed
pub fn average_speed_kmh(distance_km: f64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= 0.0 {
        return 0.0;
    }
    distance_km / (elapsed_seconds / 3600.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Builds run records and writes them to the store
#[derive(Clone)]
pub struct RunRecorder {
    store: Arc<dyn RunStore>,
}

impl RunRecorder {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Assemble the record for a finished session. Fails with
    /// `NotAuthenticated` when there is no user to attribute the run to.
    pub fn finalize(
        &self,
        summary: &RunSummary,
        user_id: Option<&str>,
        username: &str,
    ) -> Result<RunRecord> {
        let user_id = user_id.ok_or(TrackerError::NotAuthenticated)?;
        let elapsed_seconds = summary.elapsed_seconds();

        Ok(RunRecord {
            user_id: user_id.to_string(),
            username: username.to_string(),
            date: Utc::now(),
            distance_km: round2(summary.distance_km),
            duration: format_duration(elapsed_seconds as u64),
            elapsed_seconds: elapsed_seconds as u64,
            average_speed_kmh: round2(average_speed_kmh(summary.distance_km, elapsed_seconds)),
        })
    }

    /// Append the record in the background. At most one attempt is made; a
    /// failure is logged and the record is dropped.
    pub fn hand_off(&self, record: RunRecord) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let user = record.user_id.clone();
            match store.append_run(record).await {
                Ok(()) => info!("Run saved for {}", user),
                Err(e) => warn!("Run for {} was not saved: {}", user, e),
            }
        })
    }
}
