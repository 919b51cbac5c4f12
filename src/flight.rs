use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::GeoPoint;
use crate::position::PositionUpdate;
use crate::tracker::Encounter;

/// How a piece of flight information was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoConfidence {
    /// Nothing known yet
    Unknown,
    /// Derived from a heuristic; may still be revised
    Estimated,
    /// Directly observed
    Confirmed,
}

/// Coarse aircraft category, used to tell the two sides of an aerotow apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftKind {
    Glider,
    TowPlane,
    Unknown,
}

/// Set of launch method flags for a flight.
///
/// While classification is still running the set holds the remaining
/// candidates alongside `UNKNOWN`; candidates are removed as they are ruled
/// out. Once classified the set holds exactly one of `AEROTOW` (plus the
/// `ON_TOW`/`TOW_PLANE` role), `WINCH` or `SELF_LAUNCH`. An empty set means
/// no classification has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchMethod(u8);

impl LaunchMethod {
    pub const NONE: LaunchMethod = LaunchMethod(0);
    pub const UNKNOWN: LaunchMethod = LaunchMethod(1 << 0);
    pub const AEROTOW: LaunchMethod = LaunchMethod(1 << 1);
    pub const WINCH: LaunchMethod = LaunchMethod(1 << 2);
    pub const SELF_LAUNCH: LaunchMethod = LaunchMethod(1 << 3);
    /// Aerotow role: this aircraft is the one being towed
    pub const ON_TOW: LaunchMethod = LaunchMethod(1 << 4);
    /// Aerotow role: this aircraft is doing the towing
    pub const TOW_PLANE: LaunchMethod = LaunchMethod(1 << 5);

    /// Candidate set assigned when classification starts
    pub const CANDIDATES: LaunchMethod = LaunchMethod(
        Self::UNKNOWN.0 | Self::AEROTOW.0 | Self::WINCH.0 | Self::SELF_LAUNCH.0,
    );

    pub const fn union(self, other: LaunchMethod) -> LaunchMethod {
        LaunchMethod(self.0 | other.0)
    }

    /// True when every flag of `other` is present
    pub const fn contains(self, other: LaunchMethod) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: LaunchMethod) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: LaunchMethod) {
        self.0 &= !other.0;
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for LaunchMethod {
    type Output = LaunchMethod;

    fn bitor(self, rhs: LaunchMethod) -> LaunchMethod {
        self.union(rhs)
    }
}

impl std::fmt::Display for LaunchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        let mut names = Vec::new();
        for (flag, name) in [
            (Self::UNKNOWN, "unknown"),
            (Self::AEROTOW, "aerotow"),
            (Self::WINCH, "winch"),
            (Self::SELF_LAUNCH, "self"),
            (Self::ON_TOW, "on_tow"),
            (Self::TOW_PLANE, "tow_plane"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        write!(f, "{}", names.join("|"))
    }
}

/// A flight representing a complete takeoff to landing sequence for one
/// aircraft, assembled incrementally from position reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    /// Unique identifier for this flight
    pub id: Uuid,

    /// Aircraft this flight belongs to
    pub aircraft_id: String,

    /// Aircraft category, when supplied by the caller
    pub aircraft_kind: AircraftKind,

    /// Takeoff time (null for flights first seen airborne)
    pub takeoff_time: Option<DateTime<Utc>>,

    /// Landing time; an estimate while `landing_info` is `Estimated`
    pub landing_time: Option<DateTime<Utc>>,

    pub takeoff_location: Option<GeoPoint>,
    pub landing_location: Option<GeoPoint>,

    /// Takeoff heading in [1, 360]; 360 means north
    pub takeoff_heading: Option<u16>,

    /// Landing heading in [1, 360]; 360 means north
    pub landing_heading: Option<u16>,

    pub takeoff_info: InfoConfidence,
    pub landing_info: InfoConfidence,

    pub launch_method: LaunchMethod,

    /// When the launch phase ended (winch release, tow release, ...)
    pub launch_finished: Option<DateTime<Utc>>,

    /// Tow pairings recorded during the launch
    pub encounters: Vec<Encounter>,

    /// Buffered position reports, ascending by timestamp
    pub updates: Vec<PositionUpdate>,
}

impl Flight {
    pub fn new(aircraft_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            aircraft_id: aircraft_id.into(),
            aircraft_kind: AircraftKind::Unknown,
            takeoff_time: None,
            landing_time: None,
            takeoff_location: None,
            landing_location: None,
            takeoff_heading: None,
            landing_heading: None,
            takeoff_info: InfoConfidence::Unknown,
            landing_info: InfoConfidence::Unknown,
            launch_method: LaunchMethod::NONE,
            launch_finished: None,
            encounters: Vec::new(),
            updates: Vec::new(),
        }
    }

    pub fn with_kind(aircraft_id: impl Into<String>, kind: AircraftKind) -> Self {
        let mut flight = Self::new(aircraft_id);
        flight.aircraft_kind = kind;
        flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_set_narrows_to_one_method() {
        let mut method = LaunchMethod::CANDIDATES;
        assert!(method.contains(LaunchMethod::UNKNOWN | LaunchMethod::AEROTOW));
        assert!(method.contains(LaunchMethod::UNKNOWN | LaunchMethod::WINCH));

        method.remove(LaunchMethod::AEROTOW);
        assert!(!method.contains(LaunchMethod::AEROTOW));
        assert!(method.contains(LaunchMethod::WINCH));

        method = LaunchMethod::WINCH;
        assert!(!method.contains(LaunchMethod::UNKNOWN));
        assert_eq!(method.to_string(), "winch");
    }

    #[test]
    fn aerotow_carries_a_role() {
        let method = LaunchMethod::AEROTOW | LaunchMethod::TOW_PLANE;
        assert!(method.contains(LaunchMethod::AEROTOW));
        assert!(method.contains(LaunchMethod::TOW_PLANE));
        assert!(!method.contains(LaunchMethod::ON_TOW));
        assert_eq!(method.to_string(), "aerotow|tow_plane");
    }

    #[test]
    fn empty_set_displays_as_none() {
        assert_eq!(LaunchMethod::NONE.to_string(), "none");
        assert!(LaunchMethod::NONE.is_none());
    }
}
