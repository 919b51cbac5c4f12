//! Aerotow detection.
//!
//! Whether a departing aircraft is part of a tow pair cannot be decided from
//! its own track alone, so the departing handler asks a collaborator for
//! candidate pairings with other aircraft. The built-in detector scans the
//! factory's tracked set for a neighbour climbing out alongside; callers with
//! richer data can inject their own [`TowDetector`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ContextMap;
use crate::flight::{AircraftKind, Flight};
use crate::geometry::haversine_distance;
use crate::position::PositionUpdate;
use crate::tracker::FlightState;

/// How close a tow pair is expected to be while climbing out
const VICINITY_RADIUS_METERS: f64 = 500.0;
/// Maximum age difference between the two aircraft's latest samples
const SYNCHRONIZED_WINDOW_SECONDS: i64 = 30;

/// The role of the other aircraft in an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    /// The other aircraft is the towing aircraft
    Tug,
    /// The other aircraft is the one being towed
    Tow,
}

/// A candidate pairing with another aircraft during launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub other_aircraft_id: String,
    pub kind: EncounterKind,
    pub start_time: DateTime<Utc>,
    /// When the pairing ended, if known
    pub end_time: Option<DateTime<Utc>>,
}

/// Collaborator that proposes tow pairings for a departing aircraft.
/// An empty result means no pairing was found.
pub trait TowDetector: Send + Sync {
    fn encounters(&self, flight: &Flight, current: &PositionUpdate) -> Vec<Encounter>;
}

/// Detector used when no neighbour data is available
#[derive(Debug, Default)]
pub struct DisabledTowDetector;

impl TowDetector for DisabledTowDetector {
    fn encounters(&self, _flight: &Flight, _current: &PositionUpdate) -> Vec<Encounter> {
        Vec::new()
    }
}

/// Detector backed by the factory's own tracked set.
///
/// A tow pair climbs out together: both sides are in their departure phase,
/// their latest samples are close in time, and they are within a few hundred
/// meters of each other. The neighbour's aircraft kind decides which side of
/// the pair it is; neighbours of unknown kind are skipped.
pub(crate) struct VicinityTowDetector {
    contexts: ContextMap,
}

impl VicinityTowDetector {
    pub(crate) fn new(contexts: ContextMap) -> Self {
        Self { contexts }
    }
}

impl TowDetector for VicinityTowDetector {
    fn encounters(&self, flight: &Flight, current: &PositionUpdate) -> Vec<Encounter> {
        let mut found = Vec::new();

        for entry in self.contexts.iter() {
            if entry.key() == &flight.aircraft_id {
                continue;
            }

            // A context busy with its own intake is skipped; the probe runs
            // again on the next sample
            let Ok(other) = entry.value().context.try_lock() else {
                continue;
            };

            if !matches!(
                other.state(),
                FlightState::Departing | FlightState::Aerotow
            ) {
                continue;
            }

            let Some(other_position) = other.current_position() else {
                continue;
            };

            let age = (other_position.timestamp - current.timestamp).num_seconds();
            if age.abs() > SYNCHRONIZED_WINDOW_SECONDS {
                continue;
            }

            let distance = haversine_distance(
                current.latitude,
                current.longitude,
                other_position.latitude,
                other_position.longitude,
            );
            if distance > VICINITY_RADIUS_METERS {
                continue;
            }

            let kind = match other.flight().aircraft_kind {
                AircraftKind::TowPlane => EncounterKind::Tug,
                AircraftKind::Glider => EncounterKind::Tow,
                AircraftKind::Unknown => continue,
            };

            debug!(
                aircraft_id = %flight.aircraft_id,
                other_aircraft_id = %entry.key(),
                distance_m = distance as i64,
                "found tow pairing candidate"
            );

            found.push(Encounter {
                other_aircraft_id: entry.key().clone(),
                kind,
                start_time: current.timestamp,
                end_time: None,
            });
        }

        found
    }
}
