// src/location/nmea.rs
//! NMEA sentence parsing

use super::fix::LatestFix;
use crate::error::{Result, TrackerError};

/// Parse a single NMEA sentence and update the fix cell.
///
/// Sentences without position data are ignored. A sentence whose checksum
/// does not match is rejected.
pub fn parse_nmea_sentence(data: &mut LatestFix, line: &str) -> Result<()> {
    verify_checksum(line)?;

    let body = line.split('*').next().unwrap_or(line);
    let parts: Vec<&str> = body.split(',').collect();

    if line.starts_with("$GPGGA") || line.starts_with("$GNGGA") {
        parse_gga(data, &parts)
    } else if line.starts_with("$GPRMC") || line.starts_with("$GNRMC") {
        parse_rmc(data, &parts)
    } else {
        Ok(())
    }
}

/// Check the `*hh` XOR checksum if the sentence carries one
fn verify_checksum(line: &str) -> Result<()> {
    let Some(body) = line.strip_prefix('$') else {
        return Err(TrackerError::Parse(format!("Not an NMEA sentence: {}", line)));
    };
    let Some((payload, checksum)) = body.split_once('*') else {
        return Ok(());
    };

    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| TrackerError::Parse(format!("Bad checksum field '{}'", checksum)))?;
    let actual = payload.bytes().fold(0u8, |acc, b| acc ^ b);

    if actual != expected {
        return Err(TrackerError::Parse(format!(
            "Checksum mismatch: expected {:02X}, computed {:02X}",
            expected, actual
        )));
    }
    Ok(())
}

/// Convert `ddmm.mmmm` plus hemisphere into signed decimal degrees
fn parse_angle(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let raw = value.parse::<f64>().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let angle = degrees + minutes / 60.0;
    Some(if hemisphere == negative { -angle } else { angle })
}

/// Parse GGA (Global Positioning System Fix Data) sentence
fn parse_gga(data: &mut LatestFix, parts: &[&str]) -> Result<()> {
    if parts.len() < 10 {
        return Err(TrackerError::Parse("Truncated GGA sentence".to_string()));
    }

    // Fix quality (field 6); 0 means no fix
    if let Ok(quality) = parts[6].parse::<u8>() {
        data.fix_quality = Some(quality);
        if quality == 0 {
            data.clear_position();
            return Ok(());
        }
    }

    // Latitude (fields 2, 3) and longitude (fields 4, 5)
    if let (Some(lat), Some(lon)) = (
        parse_angle(parts[2], parts[3], "S"),
        parse_angle(parts[4], parts[5], "W"),
    ) {
        data.latitude = Some(lat);
        data.longitude = Some(lon);
        data.update_timestamp();
    }

    if let Ok(sats) = parts[7].parse::<u8>() {
        data.satellites = Some(sats);
    }

    if let Ok(hdop) = parts[8].parse::<f64>() {
        data.hdop = Some(hdop);
    }

    if let Ok(alt) = parts[9].parse::<f64>() {
        data.altitude = Some(alt);
    }

    Ok(())
}

/// Parse RMC (Recommended Minimum) sentence
fn parse_rmc(data: &mut LatestFix, parts: &[&str]) -> Result<()> {
    if parts.len() < 7 {
        return Err(TrackerError::Parse("Truncated RMC sentence".to_string()));
    }

    // Status (field 2): A = valid, V = receiver warning
    if parts[2] != "A" {
        data.clear_position();
        return Ok(());
    }

    if let (Some(lat), Some(lon)) = (
        parse_angle(parts[3], parts[4], "S"),
        parse_angle(parts[5], parts[6], "W"),
    ) {
        data.latitude = Some(lat);
        data.longitude = Some(lon);
        data.update_timestamp();
    }

    Ok(())
}
