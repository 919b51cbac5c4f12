//! Geographic and heading arithmetic shared by the flight state handlers.

use serde::{Deserialize, Serialize};

/// A geographic point with latitude and longitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Calculate the distance between two points using the Haversine formula
/// Returns distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0; // Earth's radius in meters

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Smallest absolute difference between two headings on the circle,
/// in degrees within [0, 180]
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Arithmetic mean of a set of track samples in degrees.
/// Returns None for an empty set.
pub fn mean_track(tracks: &[f32]) -> Option<f32> {
    if tracks.is_empty() {
        return None;
    }
    Some(tracks.iter().sum::<f32>() / tracks.len() as f32)
}

/// Round a track to a whole-degree compass heading in [1, 360].
/// A computed 0 means north and is reported as 360.
pub fn compass_heading(track: f32) -> u16 {
    let rounded = track.round().rem_euclid(360.0) as u16;
    if rounded == 0 { 360 } else { rounded }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude is roughly 111 km
        let d = haversine_distance(52.0, 5.0, 53.0, 5.0);
        assert!((d - 111_195.0).abs() < 500.0, "got {}", d);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert!(haversine_distance(52.0, 5.0, 52.0, 5.0) < 0.001);
    }

    #[test]
    fn angular_difference_wraps_the_circle() {
        assert_eq!(angular_difference(10.0, 350.0), 20.0);
        assert_eq!(angular_difference(350.0, 10.0), 20.0);
        assert_eq!(angular_difference(90.0, 270.0), 180.0);
        assert_eq!(angular_difference(45.0, 45.0), 0.0);
    }

    #[test]
    fn compass_heading_remaps_north() {
        assert_eq!(compass_heading(0.0), 360);
        assert_eq!(compass_heading(359.7), 360);
        assert_eq!(compass_heading(0.4), 360);
        assert_eq!(compass_heading(0.6), 1);
        assert_eq!(compass_heading(90.2), 90);
    }

    #[test]
    fn mean_track_of_samples() {
        assert_eq!(mean_track(&[88.0, 90.0, 92.0]), Some(90.0));
        assert_eq!(mean_track(&[]), None);
    }
}
