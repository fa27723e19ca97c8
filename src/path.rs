// src/path.rs
//! Display polyline derived from the recorded path

use crate::geo::{interpolate, Coordinate};

/// Points inserted between each pair of recorded points by default
pub const DEFAULT_POINTS_PER_SEGMENT: usize = 10;

/// Interpolated points for every consecutive pair in `path`, concatenated in path order.
///
/// Recorded points themselves are not repeated, so a path of fewer than two
/// points yields an empty polyline.
pub fn smooth_path(path: &[Coordinate], points_per_segment: usize) -> Vec<Coordinate> {
    path.windows(2)
        .flat_map(|pair| interpolate(pair[0], pair[1], points_per_segment))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_paths_are_empty() {
        assert!(smooth_path(&[], DEFAULT_POINTS_PER_SEGMENT).is_empty());
        assert!(smooth_path(&[Coordinate::new(1.0, 1.0)], DEFAULT_POINTS_PER_SEGMENT).is_empty());
    }

    #[test]
    fn test_two_points_default_density() {
        let path = [Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0)];
        assert_eq!(smooth_path(&path, DEFAULT_POINTS_PER_SEGMENT).len(), 10);
    }

    #[test]
    fn test_segments_in_order() {
        let path = [
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(0.0, 3.0),
        ];
        let smoothed = smooth_path(&path, 1);

        assert_eq!(
            smoothed,
            vec![Coordinate::new(0.0, 0.5), Coordinate::new(0.0, 2.0)]
        );
    }
}
