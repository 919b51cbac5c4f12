//! Handlers for the cruise and arrival phases: descent detection, arrival
//! estimation from the mean climb rate, and final confirmation.

use tracing::{debug, info};

use super::context::{ContextOutcome, FlightContext};
use super::state::Trigger;
use crate::events::FlightEvent;
use crate::flight::InfoConfidence;
use crate::geometry::{compass_heading, mean_track};
use crate::position::PositionUpdate;

/// Extra time an estimated arrival has to ripen before it becomes final
pub(crate) const ARRIVAL_THEORY_GRACE_SECONDS: i64 = 10;
/// Above this altitude in metres an approach is considered abandoned
const LANDING_ABORT_ALTITUDE_METERS: f64 = 1000.0;
/// Below this altitude a sustained descent counts as an approach
const LOW_ALTITUDE_METERS: f64 = 250.0;
/// Consecutive sinking samples required to call a descent
const DESCENT_SAMPLE_COUNT: usize = 3;
/// Samples with a usable track used for the arrival heading
const ARRIVAL_HEADING_SAMPLES: usize = 5;
/// Sample pairs feeding the mean climb rate
const CLIMB_RATE_PAIRS: usize = 10;
/// Estimates further out than this are discarded as noise
const MAX_TIME_TO_ARRIVAL_SECONDS: f64 = 600.0;

/// Watches the cruise for the start of an approach: the last few samples
/// sinking monotonically with the aircraft already low.
pub(crate) fn handle_cruise(ctx: &mut FlightContext) -> Option<Trigger> {
    let current = ctx.current_position.clone()?;
    let updates = &ctx.flight.updates;
    if updates.len() < DESCENT_SAMPLE_COUNT {
        return None;
    }

    let tail = &updates[updates.len() - DESCENT_SAMPLE_COUNT..];
    let descending = tail
        .windows(2)
        .all(|w| w[1].altitude_meters < w[0].altitude_meters);
    if descending && current.altitude_meters < LOW_ALTITUDE_METERS {
        debug!(
            aircraft_id = %ctx.flight.aircraft_id,
            altitude_m = current.altitude_meters as i64,
            "sustained descent at low altitude, expecting arrival"
        );
        return Some(Trigger::Landing);
    }
    None
}

/// Estimates and finalises the arrival.
///
/// Wheels down confirms the landing directly. Otherwise the handler keeps a
/// running arrival theory: estimated touchdown from the mean climb rate,
/// finalised once the estimate is comfortably in the past.
pub(crate) fn handle_arriving(
    ctx: &mut FlightContext,
    out: &mut ContextOutcome,
) -> Option<Trigger> {
    out.cancel_review = true;
    let current = ctx.current_position.clone()?;

    if current.altitude_meters > LANDING_ABORT_ALTITUDE_METERS {
        // The approach is off; the stale theory goes with it
        let flight = &mut ctx.flight;
        flight.landing_time = None;
        flight.landing_info = InfoConfidence::Unknown;
        flight.landing_heading = None;
        debug!(aircraft_id = %flight.aircraft_id, "climbing again, landing aborted");
        return Some(Trigger::LandingAborted);
    }

    let (heading, latest_location) = {
        let headed: Vec<&PositionUpdate> = ctx
            .flight
            .updates
            .iter()
            .rev()
            .filter(|u| u.known_track().is_some())
            .take(ARRIVAL_HEADING_SAMPLES)
            .collect();
        if headed.is_empty() {
            return None;
        }
        let tracks: Vec<f32> = headed.iter().filter_map(|u| u.known_track()).collect();
        (compass_heading(mean_track(&tracks)?), headed[0].location())
    };

    // Wheels down
    if current.known_speed() == Some(0.0) {
        let flight = &mut ctx.flight;
        flight.landing_time = Some(current.timestamp);
        flight.landing_info = InfoConfidence::Confirmed;
        flight.landing_heading = Some(heading);
        flight.landing_location = Some(latest_location);
        info!(
            aircraft_id = %flight.aircraft_id,
            heading,
            "landing confirmed"
        );
        out.events.push(FlightEvent::Landing(flight.clone()));
        return Some(Trigger::Arrived);
    }

    // A previously estimated arrival has ripened
    if ctx.flight.landing_info == InfoConfidence::Estimated
        && let Some(landing_time) = ctx.flight.landing_time
        && current.timestamp > landing_time + chrono::Duration::seconds(ARRIVAL_THEORY_GRACE_SECONDS)
    {
        info!(
            aircraft_id = %ctx.flight.aircraft_id,
            landing_time = %landing_time,
            "estimated arrival ripened"
        );
        out.events.push(FlightEvent::Landing(ctx.flight.clone()));
        return Some(Trigger::Arrived);
    }

    // Estimate time until touchdown from the mean climb rate
    let updates = &ctx.flight.updates;
    let tail = &updates[updates.len().saturating_sub(CLIMB_RATE_PAIRS + 1)..];
    let mut rates = Vec::with_capacity(tail.len());
    for pair in tail.windows(2) {
        let dt = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
        if dt > 0.0 {
            rates.push((pair[1].altitude_meters - pair[0].altitude_meters) / dt);
        }
    }
    if rates.is_empty() {
        return None;
    }
    let mean_rate: f64 = rates.iter().sum::<f64>() / rates.len() as f64;
    if mean_rate == 0.0 {
        return None;
    }

    let eta_seconds = current.altitude_meters / mean_rate.abs();
    if !eta_seconds.is_finite() || eta_seconds > MAX_TIME_TO_ARRIVAL_SECONDS {
        return None;
    }

    let landing_time =
        current.timestamp + chrono::Duration::milliseconds((eta_seconds * 1000.0).round() as i64);
    let flight = &mut ctx.flight;
    flight.landing_time = Some(landing_time);
    flight.landing_info = InfoConfidence::Estimated;
    flight.landing_heading = Some(heading);
    debug!(
        aircraft_id = %flight.aircraft_id,
        eta_s = eta_seconds as i64,
        "arrival estimated"
    );
    out.schedule_review_at =
        Some(landing_time + chrono::Duration::seconds(ARRIVAL_THEORY_GRACE_SECONDS));

    None
}
