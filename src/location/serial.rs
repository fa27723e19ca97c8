// src/location/serial.rs
//! Serial NMEA receiver

use super::{feed::Feed, nmea, AccuracyTier, PositionSampler};
use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
};
use async_trait::async_trait;
use std::{io, time::Duration};
use tokio::io::BufReader;
use tokio_serial::{ErrorKind, SerialPortBuilderExt};
use tracing::{debug, info};

/// Position sampler reading NMEA sentences from a serial GPS receiver
pub struct SerialSampler {
    port: String,
    baudrate: u32,
    feed: Feed,
}

impl SerialSampler {
    pub fn new(port: String, baudrate: u32, max_fix_age_secs: u64) -> Self {
        Self {
            port,
            baudrate,
            feed: Feed::new(max_fix_age_secs),
        }
    }

    fn open(&self) -> Result<()> {
        info!("Connecting to GPS on {} at {} baud...", self.port, self.baudrate);

        let serial = tokio_serial::new(&self.port, self.baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| open_error(&self.port, e))?;

        self.feed.attach(BufReader::new(serial), "serial", nmea::parse_nmea_sentence);
        info!("Connected to {}", self.port);
        Ok(())
    }
}

#[async_trait]
impl PositionSampler for SerialSampler {
    fn name(&self) -> &str {
        "serial"
    }

    async fn request_permission(&self) -> Result<()> {
        if !self.feed.is_attached() {
            self.open()?;
        }
        Ok(())
    }

    async fn current_fix(&self, accuracy: AccuracyTier) -> Result<Coordinate> {
        if !self.feed.is_attached() {
            debug!("Serial feed is down, reopening {}", self.port);
            self.open()
                .map_err(|e| TrackerError::LocationUnavailable(e.to_string()))?;
        }
        self.feed.current_fix(accuracy)
    }
}

/// The OS refusing the device node is the serial flavour of a denied permission
fn open_error(port: &str, e: tokio_serial::Error) -> TrackerError {
    let message = format!("Failed to open serial port {}: {}", port, e);
    match e.kind() {
        ErrorKind::Io(io::ErrorKind::PermissionDenied) => TrackerError::PermissionDenied(message),
        _ => TrackerError::Connection(message),
    }
}

/// List available serial ports as `(name, description)` pairs
pub fn list_serial_ports() -> Result<Vec<(String, String)>> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TrackerError::Other(format!("Failed to list serial ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .map(|port| (port.port_name, format!("{:?}", port.port_type)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_device_is_permission_error() {
        let denied = tokio_serial::Error::new(
            ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "Access denied",
        );
        assert!(matches!(
            open_error("/dev/ttyUSB0", denied),
            TrackerError::PermissionDenied(_)
        ));

        let missing = tokio_serial::Error::new(ErrorKind::NoDevice, "Permission wording is not enough");
        assert!(matches!(
            open_error("/dev/ttyUSB0", missing),
            TrackerError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_port_is_not_a_permission_error() {
        let sampler = SerialSampler::new("/dev/run-tracker-no-such-port".to_string(), 9600, 10);
        let err = sampler.request_permission().await.unwrap_err();
        assert!(!matches!(err, TrackerError::PermissionDenied(_)));

        let err = sampler.current_fix(AccuracyTier::Low).await.unwrap_err();
        assert!(err.is_transient());
    }
}
