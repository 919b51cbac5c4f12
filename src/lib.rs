//! Flight event detection for glider-operations telemetry.
//!
//! This library turns a stream of aircraft position reports into high-level
//! flight events: takeoff, landing, launch-method classification (aerotow /
//! winch / self-launch) and loss of contact. Reports may arrive at irregular
//! intervals, mid-flight, with gaps, or out of order; each aircraft is
//! tracked independently by its own state machine.
//!
//! The entry point is [`FlightContextFactory`]: feed it batches of
//! [`PositionUpdate`]s and subscribe to its event streams.

pub mod config;
pub mod events;
pub mod flight;
pub mod geometry;
pub mod position;
pub mod spline;
pub mod tracker;

pub use config::TrackerOptions;
pub use events::{CompletedWithErrors, CompletionIssue, EventBus};
pub use flight::{AircraftKind, Flight, InfoConfidence, LaunchMethod};
pub use geometry::GeoPoint;
pub use position::PositionUpdate;
pub use spline::{CubicSpline, SplineError};
pub use tracker::{
    DisabledTowDetector, Encounter, EncounterKind, FactoryError, FlightContext,
    FlightContextFactory, FlightState, TowDetector,
};
