// src/location/gpsd.rs
//! GPSD client implementation

use super::{feed::Feed, fix::LatestFix, AccuracyTier, PositionSampler};
use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| TrackerError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON data
pub fn parse_gpsd_json(data: &mut LatestFix, line: &str) -> Result<()> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| TrackerError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => parse_tpv_message(data, &msg.data),
        "SKY" => parse_sky_message(data, &msg.data),
        "VERSION" => {
            if let Some(version) = msg.data.get("release").and_then(|v| v.as_str()) {
                info!("Connected to gpsd version: {}", version);
            }
        }
        _ => {
            // Ignore unknown message types
        }
    }

    Ok(())
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(data: &mut LatestFix, msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(mode) = msg_data.get("mode").and_then(|v| v.as_u64()) {
        data.mode = Some(mode as u8);
        if mode < 2 {
            data.clear_position();
            return;
        }
    }

    let lat = msg_data.get("lat").and_then(|v| v.as_f64());
    let lon = msg_data.get("lon").and_then(|v| v.as_f64());
    if let (Some(lat), Some(lon)) = (lat, lon) {
        data.latitude = Some(lat);
        data.longitude = Some(lon);
        data.update_timestamp();
    }

    if let Some(alt) = msg_data.get("alt").and_then(|v| v.as_f64()) {
        data.altitude = Some(alt);
    }
}

/// Parse SKY (satellite data) message
fn parse_sky_message(data: &mut LatestFix, msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(satellites) = msg_data.get("satellites").and_then(|v| v.as_array()) {
        let used = satellites
            .iter()
            .filter(|sat| sat.get("used").and_then(|v| v.as_bool()).unwrap_or(false))
            .count();
        data.satellites = Some(used.min(u8::MAX as usize) as u8);
    }

    if let Some(hdop) = msg_data.get("hdop").and_then(|v| v.as_f64()) {
        data.hdop = Some(hdop);
    }
}

/// Position sampler backed by a gpsd daemon
pub struct GpsdSampler {
    host: String,
    port: u16,
    feed: Feed,
}

impl GpsdSampler {
    pub fn new(host: String, port: u16, max_fix_age_secs: u64) -> Self {
        Self {
            host,
            port,
            feed: Feed::new(max_fix_age_secs),
        }
    }

    async fn connect(&self) -> Result<()> {
        info!("Connecting to gpsd at {}:{}...", self.host, self.port);
        let reader = connect_gpsd(&self.host, self.port).await?;
        self.feed.attach(reader, "gpsd", parse_gpsd_json);
        info!("Connected to gpsd");
        Ok(())
    }
}

#[async_trait]
impl PositionSampler for GpsdSampler {
    fn name(&self) -> &str {
        "gpsd"
    }

    /// gpsd has no access control of its own; being able to connect is the grant
    async fn request_permission(&self) -> Result<()> {
        if !self.feed.is_attached() {
            self.connect().await?;
        }
        Ok(())
    }

    async fn current_fix(&self, accuracy: AccuracyTier) -> Result<Coordinate> {
        if !self.feed.is_attached() {
            debug!("gpsd feed is down, reconnecting");
            self.connect()
                .await
                .map_err(|e| TrackerError::LocationUnavailable(e.to_string()))?;
        }
        self.feed.current_fix(accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tpv_parsing() {
        let mut data = LatestFix::new();
        let json = r#"{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2023-01-01T12:00:00.000Z","ept":0.005,"lat":48.117,"lon":11.517,"alt":545.4,"epx":15.319,"epy":17.054,"epv":124.484,"track":10.3797,"speed":0.091,"climb":10.7,"eps":34.11,"epc":248.97}"#;

        parse_gpsd_json(&mut data, json).unwrap();

        assert_eq!(data.latitude, Some(48.117));
        assert_eq!(data.longitude, Some(11.517));
        assert_eq!(data.altitude, Some(545.4));
        assert_eq!(data.mode, Some(3));
        assert!(data.has_fix());
    }

    #[test]
    fn test_tpv_without_fix_clears_position() {
        let mut data = LatestFix::new();
        parse_gpsd_json(&mut data, r#"{"class":"TPV","mode":3,"lat":48.1,"lon":11.5}"#).unwrap();
        parse_gpsd_json(&mut data, r#"{"class":"TPV","mode":1}"#).unwrap();

        assert!(!data.has_fix());
        assert!(data.latitude.is_none());
    }

    #[test]
    fn test_sky_parsing() {
        let mut data = LatestFix::new();
        let json = r#"{"class":"SKY","device":"/dev/ttyUSB0","time":"2023-01-01T12:00:00.000Z","hdop":1.2,"satellites":[{"PRN":1,"ss":42,"used":true},{"PRN":2,"ss":38,"used":true},{"PRN":3,"ss":12,"used":false}]}"#;

        parse_gpsd_json(&mut data, json).unwrap();

        assert_eq!(data.satellites, Some(2));
        assert_eq!(data.hdop, Some(1.2));
    }

    #[test]
    fn test_invalid_json() {
        let mut data = LatestFix::new();
        let invalid_json = r#"{"invalid": json"#;

        let result = parse_gpsd_json(&mut data, invalid_json);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_daemon_fails_permission() {
        // Port 1 on localhost is essentially never a gpsd
        let sampler = GpsdSampler::new("127.0.0.1".to_string(), 1, 10);
        let err = sampler.request_permission().await.unwrap_err();
        assert!(matches!(err, TrackerError::Connection(_)));

        let err = sampler.current_fix(AccuracyTier::Low).await.unwrap_err();
        assert!(err.is_transient());
    }
}
