//! Handlers for the ground and launch phases: detecting the takeoff roll and
//! classifying the launch method (aerotow / winch / self-launch).

use tracing::{debug, info};

use super::context::{ContextOutcome, FlightContext, MOVING_SPEED_KNOTS};
use super::state::Trigger;
use super::towing::{EncounterKind, TowDetector};
use crate::events::FlightEvent;
use crate::flight::{InfoConfidence, LaunchMethod};
use crate::geometry::{angular_difference, compass_heading, mean_track};
use crate::position::PositionUpdate;
use crate::spline::CubicSpline;

/// Above this altitude in metres a first-seen moving aircraft is assumed to
/// already be airborne rather than departing
const RADAR_CONTACT_ALTITUDE_METERS: f64 = 1000.0;
/// Samples with a usable track needed before classification starts
const HEADING_SAMPLE_COUNT: usize = 5;
/// Settling time after the takeoff roll before classification runs
const LAUNCH_DEBOUNCE_SECONDS: i64 = 10;
/// Altitude loss against the previous sample that counts as sinking
const DEPARTURE_SINK_MARGIN_METERS: f64 = 3.0;
/// Maximum heading divergence during a winch climb
const WINCH_MAX_HEADING_ERROR_DEGREES: f32 = 20.0;
/// Maximum ground distance covered by a winch launch
const WINCH_MAX_GROUND_RUN_METERS: f64 = 3000.0;
/// Sustained climb/sink rate marking a tow release, in m/s
const TOW_RELEASE_RATE_MPS: f64 = 0.5;
/// Samples inspected for the tow-release climb profile
const TOW_RELEASE_SAMPLES: usize = 7;

/// Waits on the ground until the aircraft picks up speed, then anchors the
/// takeoff and hands over to the departure classifier.
pub(crate) fn handle_stationary(
    ctx: &mut FlightContext,
    out: &mut ContextOutcome,
) -> Option<Trigger> {
    let current = ctx.current_position.clone()?;
    let moving = current
        .known_speed()
        .map(|s| s > MOVING_SPEED_KNOTS)
        .unwrap_or(false);
    if !moving {
        return None;
    }

    let flight = &mut ctx.flight;
    let at = flight
        .updates
        .iter()
        .rposition(|u| u.timestamp == current.timestamp)?;
    let resting = flight.updates[..at]
        .iter()
        .rev()
        .find(|u| u.is_at_rest())
        .map(|u| u.timestamp);

    match resting {
        Some(rest_time) => {
            // The last sample at rest anchors the takeoff
            flight.takeoff_time = Some(rest_time);
            flight.updates.retain(|u| u.timestamp >= rest_time);
            flight.takeoff_info = InfoConfidence::Estimated;
        }
        None if current.altitude_meters > RADAR_CONTACT_ALTITUDE_METERS => {
            // Already airborne when first seen; there is no takeoff to report
            flight.takeoff_info = InfoConfidence::Estimated;
            info!(
                aircraft_id = %flight.aircraft_id,
                altitude_m = current.altitude_meters as i64,
                "first contact mid-flight"
            );
            out.events.push(FlightEvent::RadarContact(flight.clone()));
            return Some(Trigger::Depart);
        }
        None => {
            flight.takeoff_time = Some(current.timestamp);
            flight.updates.retain(|u| u.timestamp >= current.timestamp);
            flight.takeoff_info = InfoConfidence::Estimated;
        }
    }

    info!(
        aircraft_id = %flight.aircraft_id,
        takeoff_time = ?flight.takeoff_time,
        "takeoff detected"
    );
    out.events.push(FlightEvent::Takeoff(flight.clone()));
    Some(Trigger::Depart)
}

/// Classifies the launch method while the aircraft climbs out.
///
/// Aerotow is checked first via the collaborator, then the winch signature
/// (ballistic climb that ends quickly, dead straight, short ground run), and
/// self-launch is what remains when both are ruled out.
pub(crate) fn handle_departing(
    ctx: &mut FlightContext,
    detector: &dyn TowDetector,
) -> Option<Trigger> {
    let current = ctx.current_position.clone()?;

    // Heading acquisition: wait for the first five samples with a usable track
    if ctx.flight.launch_method.is_none() {
        let (heading, first_location) = {
            let known: Vec<&PositionUpdate> = ctx
                .flight
                .updates
                .iter()
                .filter(|u| u.known_track().is_some())
                .take(HEADING_SAMPLE_COUNT)
                .collect();
            if known.len() < HEADING_SAMPLE_COUNT {
                return None;
            }
            let tracks: Vec<f32> = known.iter().filter_map(|u| u.known_track()).collect();
            (compass_heading(mean_track(&tracks)?), known[0].location())
        };

        let flight = &mut ctx.flight;
        flight.takeoff_heading = Some(heading);
        flight.takeoff_location = Some(first_location);
        flight.launch_method = LaunchMethod::CANDIDATES;
        debug!(
            aircraft_id = %flight.aircraft_id,
            heading,
            "departure heading acquired, classifying launch"
        );
    }

    // Let the aircraft get properly airborne before classifying
    if ctx.flight.takeoff_time.is_some()
        && let Some(first_moving) = ctx.flight.updates.iter().find(|u| {
            u.known_speed()
                .map(|s| s > MOVING_SPEED_KNOTS)
                .unwrap_or(false)
        })
        && current.timestamp - first_moving.timestamp
            < chrono::Duration::seconds(LAUNCH_DEBOUNCE_SECONDS)
    {
        return None;
    }

    // Aerotow: ask the collaborator for a pairing with a nearby aircraft
    if ctx
        .flight
        .launch_method
        .contains(LaunchMethod::UNKNOWN | LaunchMethod::AEROTOW)
    {
        let encounter = detector
            .encounters(&ctx.flight, &current)
            .into_iter()
            .next();
        if let Some(encounter) = encounter {
            let role = match encounter.kind {
                EncounterKind::Tug => LaunchMethod::ON_TOW,
                EncounterKind::Tow => LaunchMethod::TOW_PLANE,
            };
            let flight = &mut ctx.flight;
            flight.launch_method = LaunchMethod::AEROTOW | role;
            info!(
                aircraft_id = %flight.aircraft_id,
                other_aircraft_id = %encounter.other_aircraft_id,
                launch_method = %flight.launch_method,
                "aerotow pairing detected"
            );
            flight.encounters.push(encounter);
            return Some(Trigger::TrackAerotow);
        }
        ctx.flight.launch_method.remove(LaunchMethod::AEROTOW);
    }

    // Departure abort: sinking again before the launch was ever classified
    {
        let updates = &ctx.flight.updates;
        let at = updates
            .iter()
            .rposition(|u| u.timestamp == current.timestamp)?;
        if at > 0
            && updates[at - 1].altitude_meters
                > current.altitude_meters + DEPARTURE_SINK_MARGIN_METERS
        {
            debug!(
                aircraft_id = %ctx.flight.aircraft_id,
                "sinking during departure, treating as aborted launch"
            );
            return Some(Trigger::Landing);
        }
    }

    // Winch: the climb ends within a short, dead-straight ground track
    if ctx
        .flight
        .launch_method
        .contains(LaunchMethod::UNKNOWN | LaunchMethod::WINCH)
    {
        let epoch = ctx
            .flight
            .takeoff_time
            .or_else(|| ctx.flight.updates.first().map(|u| u.timestamp))?;
        let (xs, ys): (Vec<f64>, Vec<f64>) = ctx
            .flight
            .updates
            .iter()
            .map(|u| {
                (
                    (u.timestamp - epoch).num_milliseconds() as f64 / 1000.0,
                    u.altitude_meters,
                )
            })
            .unzip();
        // Too few samples to fit yet; try again on the next report
        let Ok(altitude) = CubicSpline::fit(xs, ys) else {
            return None;
        };

        let elapsed = (current.timestamp - epoch).num_milliseconds() as f64 / 1000.0;
        if altitude.derivative(elapsed) >= 0.0 {
            // Still climbing
            return None;
        }

        let tracks: Vec<f32> = ctx
            .flight
            .updates
            .iter()
            .filter_map(|u| u.known_track())
            .collect();
        let mean = mean_track(&tracks)?;
        let straight = tracks
            .iter()
            .all(|t| angular_difference(*t, mean) <= WINCH_MAX_HEADING_ERROR_DEGREES);
        let ground_run = ctx
            .flight
            .updates
            .first()
            .map(|u| u.location().distance_to(&current.location()))
            .unwrap_or(0.0);

        if straight && ground_run <= WINCH_MAX_GROUND_RUN_METERS {
            let flight = &mut ctx.flight;
            flight.launch_finished = Some(current.timestamp);
            flight.launch_method = LaunchMethod::WINCH;
            info!(
                aircraft_id = %flight.aircraft_id,
                elapsed_s = elapsed as i64,
                "winch launch completed"
            );
            return Some(Trigger::LaunchCompleted);
        }

        debug!(
            aircraft_id = %ctx.flight.aircraft_id,
            ground_run_m = ground_run as i64,
            "winch ruled out"
        );
        ctx.flight.launch_method.remove(LaunchMethod::WINCH);
    }

    // Self-launch: nothing else explains a sustained climb under power
    if ctx
        .flight
        .launch_method
        .contains(LaunchMethod::UNKNOWN | LaunchMethod::SELF_LAUNCH)
    {
        let flight = &mut ctx.flight;
        flight.launch_finished = Some(current.timestamp);
        flight.launch_method = LaunchMethod::SELF_LAUNCH;
        info!(aircraft_id = %flight.aircraft_id, "self-launch assumed");
        return Some(Trigger::LaunchCompleted);
    }

    None
}

/// Tracks an aerotow until the rope comes off.
///
/// Release is taken from the encounter window when the collaborator supplied
/// one, otherwise inferred from the climb profile: a pair under tow climbs
/// steadily, and a flip to sink means the tow has ended.
pub(crate) fn handle_aerotow(ctx: &mut FlightContext) -> Option<Trigger> {
    let current = ctx.current_position.clone()?;

    if let Some(end) = ctx.flight.encounters.last().and_then(|e| e.end_time)
        && current.timestamp >= end
    {
        return Some(complete_tow(ctx, current.timestamp));
    }

    let updates = &ctx.flight.updates;
    let tail = &updates[updates.len().saturating_sub(TOW_RELEASE_SAMPLES)..];
    let mut rates = Vec::with_capacity(tail.len());
    for pair in tail.windows(2) {
        let dt = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
        if dt > 0.0 {
            rates.push((pair[1].altitude_meters - pair[0].altitude_meters) / dt);
        }
    }
    if rates.len() < 5 {
        return None;
    }

    let (history, latest) = rates.split_at(rates.len() - 1);
    let average: f64 = history.iter().sum::<f64>() / history.len() as f64;
    if average > TOW_RELEASE_RATE_MPS && latest[0] < -TOW_RELEASE_RATE_MPS {
        debug!(
            aircraft_id = %ctx.flight.aircraft_id,
            average_climb_mps = average,
            latest_climb_mps = latest[0],
            "climb flipped to sink, assuming tow release"
        );
        return Some(complete_tow(ctx, current.timestamp));
    }

    None
}

fn complete_tow(ctx: &mut FlightContext, at: chrono::DateTime<chrono::Utc>) -> Trigger {
    let flight = &mut ctx.flight;
    flight.launch_finished = Some(at);
    if let Some(encounter) = flight.encounters.last_mut()
        && encounter.end_time.is_none()
    {
        encounter.end_time = Some(at);
    }
    info!(aircraft_id = %flight.aircraft_id, "tow released");
    Trigger::LaunchCompleted
}
