// src/location/mod.rs
//! Position fix acquisition from gpsd, serial receivers, Windows Location
//! Services or a replay script

pub mod feed;
pub mod fix;
pub mod gpsd;
pub mod nmea;
pub mod replay;
pub mod serial;

#[cfg(windows)]
pub mod windows;

use crate::{
    config::TrackerConfig,
    error::{Result, TrackerError},
    geo::Coordinate,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};

pub use fix::LatestFix;
pub use gpsd::GpsdSampler;
pub use replay::ReplaySampler;
pub use serial::SerialSampler;

/// Requested fix accuracy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Low,
    Balanced,
    High,
    #[default]
    BestForNavigation,
}

impl AccuracyTier {
    /// Largest horizontal dilution of precision accepted for this tier
    pub fn max_hdop(&self) -> Option<f64> {
        match self {
            AccuracyTier::Low => None,
            AccuracyTier::Balanced => Some(5.0),
            AccuracyTier::High => Some(2.5),
            AccuracyTier::BestForNavigation => Some(1.5),
        }
    }

    /// Accuracy in metres to ask of platform location services
    pub fn desired_accuracy_meters(&self) -> u32 {
        match self {
            AccuracyTier::Low => 3000,
            AccuracyTier::Balanced => 100,
            AccuracyTier::High => 10,
            AccuracyTier::BestForNavigation => 1,
        }
    }
}

impl std::str::FromStr for AccuracyTier {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "low" => Ok(AccuracyTier::Low),
            "balanced" => Ok(AccuracyTier::Balanced),
            "high" => Ok(AccuracyTier::High),
            "best" | "best_for_navigation" => Ok(AccuracyTier::BestForNavigation),
            other => Err(TrackerError::Config(format!("Unknown accuracy tier '{}'", other))),
        }
    }
}

/// Source of one-shot position fixes.
///
/// `request_permission` must succeed before fixes are requested. A failed
/// `current_fix` is expected now and then and is not fatal to a session.
#[async_trait]
pub trait PositionSampler: Send + Sync {
    /// Short human readable name of the backend
    fn name(&self) -> &str;

    /// Ask the platform for location access. Fails with `PermissionDenied`
    /// if access is declined.
    async fn request_permission(&self) -> Result<()>;

    /// Acquire one fix. Fails with `LocationUnavailable` if none can be produced.
    async fn current_fix(&self, accuracy: AccuracyTier) -> Result<Coordinate>;
}

/// Location source configuration
#[derive(Debug, Clone)]
pub enum FixSource {
    Serial { port: String, baudrate: u32 },
    Gpsd { host: String, port: u16 },
    #[cfg(windows)]
    Windows,
    Replay { file: PathBuf },
}

impl FixSource {
    /// Pick the source described by the configuration
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        match config.source_type.as_str() {
            "serial" => {
                let port = config.serial_port.clone().ok_or_else(|| {
                    TrackerError::Config("serial source needs a serial port".to_string())
                })?;
                Ok(FixSource::Serial {
                    port,
                    baudrate: config.serial_baudrate.unwrap_or(9600),
                })
            }
            "gpsd" => Ok(FixSource::Gpsd {
                host: config.gpsd_host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: config.gpsd_port.unwrap_or(2947),
            }),
            #[cfg(windows)]
            "windows" => Ok(FixSource::Windows),
            #[cfg(not(windows))]
            "windows" => Err(TrackerError::Config(
                "Windows Location Service is only available on Windows".to_string(),
            )),
            "replay" => {
                let file = config.replay_file.clone().ok_or_else(|| {
                    TrackerError::Config("replay source needs a replay file".to_string())
                })?;
                Ok(FixSource::Replay { file })
            }
            other => Err(TrackerError::Config(format!("Unknown source type '{}'", other))),
        }
    }
}

/// Build the sampler for a source
pub fn open_sampler(source: FixSource, max_fix_age_secs: u64) -> Result<Arc<dyn PositionSampler>> {
    let sampler: Arc<dyn PositionSampler> = match source {
        FixSource::Serial { port, baudrate } => {
            Arc::new(SerialSampler::new(port, baudrate, max_fix_age_secs))
        }
        FixSource::Gpsd { host, port } => Arc::new(GpsdSampler::new(host, port, max_fix_age_secs)),
        #[cfg(windows)]
        FixSource::Windows => Arc::new(windows::WindowsSampler::new()),
        FixSource::Replay { file } => Arc::new(ReplaySampler::from_file(&file)?),
    };
    Ok(sampler)
}
