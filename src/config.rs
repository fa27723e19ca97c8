// src/config.rs
//! Configuration management with a JSON file under the user's config directory

use crate::{
    error::{Result, TrackerError},
    location::AccuracyTier,
    path::DEFAULT_POINTS_PER_SEGMENT,
    tracker::TrackerSettings,
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub source_type: String, // "gpsd", "serial", "windows", "replay"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub replay_file: Option<PathBuf>,
    pub accuracy: AccuracyTier,
    pub sample_interval_ms: u64,
    pub points_per_segment: usize,
    pub fix_max_age_secs: u64,
    pub display_refresh_ms: u64,
    pub store_path: Option<PathBuf>,
    pub user_id: Option<String>,
    pub username: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl TrackerConfig {
    /// Get platform-specific default configuration
    pub fn platform_default() -> Self {
        let source_type = if cfg!(windows) { "windows" } else { "gpsd" };

        Self {
            source_type: source_type.to_string(),
            serial_port: None,
            serial_baudrate: Some(9600),
            gpsd_host: Some("localhost".to_string()),
            gpsd_port: Some(2947),
            replay_file: None,
            accuracy: AccuracyTier::BestForNavigation,
            sample_interval_ms: 500,
            points_per_segment: DEFAULT_POINTS_PER_SEGMENT,
            fix_max_age_secs: 10,
            display_refresh_ms: 1000,
            store_path: None,
            user_id: None,
            username: None,
        }
    }

    /// Load configuration from the default location, falling back to defaults
    /// when no file exists yet
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::platform_default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| TrackerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, contents)
            .map_err(|e| TrackerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| TrackerError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("run-tracker").join("config.json"))
    }

    /// Where run records are kept, unless configured otherwise
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => {
                let config_path = Self::get_config_path()?;
                let dir = config_path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_default();
                Ok(dir.join("runs.jsonl"))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(TrackerError::Config("sample_interval_ms must be positive".to_string()));
        }
        if self.display_refresh_ms == 0 {
            return Err(TrackerError::Config("display_refresh_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Timing knobs for the tracking session
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            display_refresh: Duration::from_millis(self.display_refresh_ms),
            accuracy: self.accuracy,
            points_per_segment: self.points_per_segment,
        }
    }

    /// Update configuration with new source settings
    pub fn update_source(&mut self, source_type: &str) {
        self.source_type = source_type.to_string();
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }

    /// Replay fixes from a file instead of a receiver
    pub fn update_replay(&mut self, file: PathBuf) {
        self.source_type = "replay".to_string();
        self.replay_file = Some(file);
    }

    /// Set the user runs are attributed to
    pub fn update_user(&mut self, user_id: String, username: Option<String>) {
        self.username = Some(username.unwrap_or_else(|| user_id.clone()));
        self.user_id = Some(user_id);
    }
}
