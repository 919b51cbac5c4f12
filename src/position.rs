use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::GeoPoint;

/// A single aircraft position report.
///
/// Reports arrive at irregular intervals, sometimes mid-flight, often with
/// gaps, and occasionally out of order. Speed and track may be missing; a
/// stored NaN is treated the same as a missing value. A track of 0 degrees
/// doubles as "unknown while at rest" — computed headings are reported as 360
/// for north instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Opaque aircraft identifier (device address, registration, ...)
    pub aircraft_id: String,

    /// Time the sample was taken
    pub timestamp: DateTime<Utc>,

    /// Position in degrees
    pub latitude: f64,
    pub longitude: f64,

    /// Altitude in metres, AGL or MSL as supplied by the source
    pub altitude_meters: f64,

    /// Ground speed in knots
    pub ground_speed_knots: Option<f32>,

    /// Direction of travel in degrees, 0-360
    pub track_degrees: Option<f32>,
}

impl PositionUpdate {
    /// Ground speed if it is actually known (present and finite)
    pub fn known_speed(&self) -> Option<f32> {
        self.ground_speed_knots.filter(|s| s.is_finite())
    }

    /// Track if it is actually known (present, finite, and not the
    /// 0-degrees "unknown at rest" placeholder)
    pub fn known_track(&self) -> Option<f32> {
        self.track_degrees.filter(|t| t.is_finite() && *t != 0.0)
    }

    /// Whether the aircraft is at rest in this sample.
    /// An unknown speed counts as at rest.
    pub fn is_at_rest(&self) -> bool {
        self.known_speed().map(|s| s == 0.0).unwrap_or(true)
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(speed: Option<f32>, track: Option<f32>) -> PositionUpdate {
        PositionUpdate {
            aircraft_id: "DDA5BA".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            latitude: 52.0,
            longitude: 5.0,
            altitude_meters: 0.0,
            ground_speed_knots: speed,
            track_degrees: track,
        }
    }

    #[test]
    fn nan_speed_counts_as_unknown() {
        assert_eq!(sample(Some(f32::NAN), None).known_speed(), None);
        assert!(sample(Some(f32::NAN), None).is_at_rest());
        assert!(sample(None, None).is_at_rest());
        assert!(!sample(Some(42.0), None).is_at_rest());
    }

    #[test]
    fn zero_track_is_unknown() {
        assert_eq!(sample(None, Some(0.0)).known_track(), None);
        assert_eq!(sample(None, Some(f32::NAN)).known_track(), None);
        assert_eq!(sample(None, Some(90.0)).known_track(), Some(90.0));
    }
}
