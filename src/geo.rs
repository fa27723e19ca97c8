// src/geo.rs
//! Great-circle distance and straight-line interpolation between coordinates

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(*self, *other)
    }
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * (std::f64::consts::PI / 180.0)
}

pub fn rad_to_deg(rad: f64) -> f64 {
    rad * (180.0 / std::f64::consts::PI)
}

/// Haversine distance between two coordinates in kilometres.
///
/// Symmetric in its arguments and exactly zero for identical points. Inputs are
/// taken as reported by the receiver; out-of-range values are not checked.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = deg_to_rad(b.latitude - a.latitude);
    let d_lon = deg_to_rad(b.longitude - a.longitude);

    let h = (d_lat / 2.0).sin().powi(2)
        + deg_to_rad(a.latitude).cos() * deg_to_rad(b.latitude).cos() * (d_lon / 2.0).sin().powi(2);

    // Rounding can push h a hair outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// `n` points strictly between `a` and `b`, evenly spaced at fractions `i / (n + 1)`.
///
/// The endpoints are not included; `n == 0` yields nothing. The iterator is a
/// plain value and can be cloned to walk the points again.
pub fn interpolate(a: Coordinate, b: Coordinate, n: usize) -> Interpolate {
    Interpolate { a, b, n, next: 1 }
}

#[derive(Debug, Clone)]
pub struct Interpolate {
    a: Coordinate,
    b: Coordinate,
    n: usize,
    next: usize,
}

impl Iterator for Interpolate {
    type Item = Coordinate;

    fn next(&mut self) -> Option<Coordinate> {
        if self.next > self.n {
            return None;
        }

        let steps = (self.n + 1) as f64;
        let i = self.next as f64;
        self.next += 1;

        Some(Coordinate {
            latitude: self.a.latitude + (self.b.latitude - self.a.latitude) / steps * i,
            longitude: self.a.longitude + (self.b.longitude - self.a.longitude) / steps * i,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.n + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Interpolate {}
