// src/location/replay.rs
//! Scripted fixes for demos and tests

use super::{AccuracyTier, PositionSampler};
use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
};
use async_trait::async_trait;
use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

/// Hands out one scripted fix per call.
///
/// A `None` entry plays back as a missed fix. Once the script runs out the
/// last coordinate is repeated, i.e. the runner stands still.
pub struct ReplaySampler {
    script: Vec<Option<Coordinate>>,
    cursor: Mutex<usize>,
    deny_permission: bool,
}

impl ReplaySampler {
    pub fn new(script: Vec<Option<Coordinate>>) -> Self {
        Self {
            script,
            cursor: Mutex::new(0),
            deny_permission: false,
        }
    }

    /// Every fix succeeds
    pub fn from_coordinates(coordinates: impl IntoIterator<Item = Coordinate>) -> Self {
        Self::new(coordinates.into_iter().map(Some).collect())
    }

    /// Load a JSON array of `{"latitude": .., "longitude": ..}` objects or `null`s
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("Failed to read replay file {}: {}", path.display(), e))
        })?;
        let script: Vec<Option<Coordinate>> = serde_json::from_str(&contents)?;
        Ok(Self::new(script))
    }

    /// A sampler whose permission request is always declined
    pub fn denying() -> Self {
        Self {
            deny_permission: true,
            ..Self::new(Vec::new())
        }
    }

    /// Number of fixes handed out (or missed) so far
    pub fn calls(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PositionSampler for ReplaySampler {
    fn name(&self) -> &str {
        "replay"
    }

    async fn request_permission(&self) -> Result<()> {
        if self.deny_permission {
            return Err(TrackerError::PermissionDenied(
                "Replay configured to deny location access".to_string(),
            ));
        }
        Ok(())
    }

    async fn current_fix(&self, _accuracy: AccuracyTier) -> Result<Coordinate> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let index = *cursor;
        *cursor += 1;

        match self.script.get(index) {
            Some(Some(coordinate)) => Ok(*coordinate),
            Some(None) => Err(TrackerError::LocationUnavailable(format!(
                "Scripted missed fix at step {}",
                index
            ))),
            None => self
                .script
                .iter()
                .rev()
                .flatten()
                .next()
                .copied()
                .ok_or_else(|| TrackerError::LocationUnavailable("Replay script is empty".to_string())),
        }
    }
}
