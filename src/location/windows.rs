// src/location/windows.rs
//! Windows Location Services integration

use super::{AccuracyTier, PositionSampler};
use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
};
use async_trait::async_trait;
use tracing::info;
use windows::{Devices::Geolocation::*, Foundation::*};

/// Position sampler backed by the Windows Geolocator
pub struct WindowsSampler {
    timeout: TimeSpan,
}

impl WindowsSampler {
    pub fn new() -> Self {
        Self {
            // 10 seconds in 100ns units
            timeout: TimeSpan {
                Duration: 10_000_000 * 10,
            },
        }
    }

    /// Create and configure a Geolocator for the requested accuracy
    fn create_geolocator(accuracy: AccuracyTier) -> Result<Geolocator> {
        let geolocator = Geolocator::new()?;

        let desired_accuracy = match accuracy.desired_accuracy_meters() {
            0..=100 => PositionAccuracy::High,
            _ => PositionAccuracy::Default,
        };
        geolocator.SetDesiredAccuracy(desired_accuracy)?;
        geolocator.SetMovementThreshold(1.0)?;

        Ok(geolocator)
    }

    async fn fetch(&self, accuracy: AccuracyTier) -> Result<Coordinate> {
        let geolocator = Self::create_geolocator(accuracy)?;
        let position = geolocator
            .GetGeopositionAsyncWithAgeAndTimeout(self.timeout, self.timeout)?
            .await?;

        let pos = position.Coordinate()?.Point()?.Position()?;
        Ok(Coordinate::new(pos.Latitude, pos.Longitude))
    }
}

impl Default for WindowsSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionSampler for WindowsSampler {
    fn name(&self) -> &str {
        "windows"
    }

    async fn request_permission(&self) -> Result<()> {
        let access_status = Geolocator::RequestAccessAsync()?.await?;

        match access_status {
            GeolocationAccessStatus::Allowed => {
                info!("Location access granted");
                Ok(())
            }
            GeolocationAccessStatus::Denied => Err(TrackerError::PermissionDenied(
                "Location access denied by user".to_string(),
            )),
            _ => Err(TrackerError::PermissionDenied(
                "Location access unspecified".to_string(),
            )),
        }
    }

    async fn current_fix(&self, accuracy: AccuracyTier) -> Result<Coordinate> {
        self.fetch(accuracy)
            .await
            .map_err(|e| TrackerError::LocationUnavailable(e.to_string()))
    }
}
