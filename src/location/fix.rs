// src/location/fix.rs
//! Latest-fix cell shared between a receiver feed and the sampler

use super::AccuracyTier;
use crate::geo::Coordinate;
use chrono::{DateTime, Utc};

/// Most recent position report from a streaming receiver
#[derive(Debug, Clone, Default)]
pub struct LatestFix {
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub satellites: Option<u8>,
    pub fix_quality: Option<u8>, // NMEA GGA quality
    pub hdop: Option<f64>,
    pub mode: Option<u8>,        // gpsd TPV mode
    pub source: Option<String>,
}

impl LatestFix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the data represents a valid position fix
    pub fn has_fix(&self) -> bool {
        if self.latitude.is_none() || self.longitude.is_none() {
            return false;
        }
        if matches!(self.fix_quality, Some(0)) {
            return false;
        }
        !matches!(self.mode, Some(0) | Some(1))
    }

    /// Get the age of the data in seconds
    pub fn age_seconds(&self) -> Option<i64> {
        self.timestamp.map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Check if the data is younger than `max_age_secs`
    pub fn is_recent(&self, max_age_secs: u64) -> bool {
        self.age_seconds().map_or(false, |age| age < max_age_secs as i64)
    }

    /// Update the timestamp to now
    pub fn update_timestamp(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = Some(source.to_string());
    }

    /// Forget the position, e.g. after the receiver reports a lost fix
    pub fn clear_position(&mut self) {
        self.latitude = None;
        self.longitude = None;
    }

    /// Whether the reported dilution of precision is good enough for `tier`.
    /// Receivers that don't report HDOP are trusted.
    pub fn meets(&self, tier: AccuracyTier) -> bool {
        match (tier.max_hdop(), self.hdop) {
            (Some(max), Some(hdop)) => hdop <= max,
            _ => true,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Turn the cell into a one-shot fix, or explain why there isn't one
    pub fn to_fix(&self, tier: AccuracyTier, max_age_secs: u64) -> std::result::Result<Coordinate, String> {
        if !self.has_fix() {
            return Err("receiver has no position fix".to_string());
        }
        if !self.is_recent(max_age_secs) {
            return Err(format!(
                "last fix is stale ({}s old)",
                self.age_seconds().unwrap_or_default()
            ));
        }
        if !self.meets(tier) {
            return Err(format!(
                "HDOP {:.1} too coarse for {:?}",
                self.hdop.unwrap_or_default(),
                tier
            ));
        }
        self.coordinate()
            .ok_or_else(|| "receiver has no position fix".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(lat: f64, lon: f64) -> LatestFix {
        let mut fix = LatestFix::new();
        fix.latitude = Some(lat);
        fix.longitude = Some(lon);
        fix.update_timestamp();
        fix
    }

    #[test]
    fn test_empty_cell_has_no_fix() {
        let fix = LatestFix::new();
        assert!(!fix.has_fix());
        assert!(fix.to_fix(AccuracyTier::Low, 10).is_err());
    }

    #[test]
    fn test_fresh_fix() {
        let fix = fresh(48.117, 11.517);
        assert_eq!(
            fix.to_fix(AccuracyTier::BestForNavigation, 10),
            Ok(Coordinate::new(48.117, 11.517))
        );
    }

    #[test]
    fn test_no_fix_mode_rejected() {
        let mut fix = fresh(48.0, 11.0);
        fix.mode = Some(1);
        assert!(!fix.has_fix());
    }

    #[test]
    fn test_stale_fix_rejected() {
        let mut fix = fresh(48.0, 11.0);
        fix.timestamp = Some(Utc::now() - chrono::Duration::seconds(30));
        assert!(fix.to_fix(AccuracyTier::Low, 10).is_err());
    }

    #[test]
    fn test_hdop_against_tier() {
        let mut fix = fresh(48.0, 11.0);
        fix.hdop = Some(3.0);
        assert!(fix.meets(AccuracyTier::Balanced));
        assert!(!fix.meets(AccuracyTier::High));
        assert!(fix.to_fix(AccuracyTier::BestForNavigation, 10).is_err());
        assert!(fix.to_fix(AccuracyTier::Low, 10).is_ok());
    }
}
