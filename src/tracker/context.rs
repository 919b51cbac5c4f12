use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;
use tracing::{trace, warn};

use super::arrival::{self, ARRIVAL_THEORY_GRACE_SECONDS};
use super::departure;
use super::state::{FlightState, Trigger, transition};
use super::towing::TowDetector;
use crate::events::{CompletedWithErrors, CompletionIssue, FlightEvent};
use crate::flight::{Flight, InfoConfidence};
use crate::position::PositionUpdate;

/// Ground speed above which an aircraft counts as moving, in knots
pub(crate) const MOVING_SPEED_KNOTS: f32 = 30.0;

/// Buffer tail kept under memory pressure while waiting on the ground
const MINIFIED_GROUND_SAMPLES: usize = 32;
/// Buffer tail kept under memory pressure once the launch is classified
const MINIFIED_AIRBORNE_SAMPLES: usize = 12;

/// What a single intake produced: events to fan out and arrival-review
/// timer bookkeeping for the factory to apply.
#[derive(Debug, Default)]
pub(crate) struct ContextOutcome {
    pub events: Vec<FlightEvent>,
    pub cancel_review: bool,
    pub schedule_review_at: Option<DateTime<Utc>>,
}

/// Per-aircraft runtime state: one Flight aggregate plus the state machine
/// driving it.
///
/// A context is single-writer: the factory serialises all intakes for one
/// aircraft behind its per-context lock, so the methods here never race.
#[derive(Debug)]
pub struct FlightContext {
    pub(crate) flight: Flight,
    pub(crate) state: FlightState,
    pub(crate) current_position: Option<PositionUpdate>,
    /// Wall-clock time of the last intake, used for expiry
    pub(crate) last_active: DateTime<Utc>,
    pub(crate) minify_memory: bool,
    /// Abort handle of the scheduled arrival-review task, if any
    pub(crate) arrival_review: Option<AbortHandle>,
}

impl Clone for FlightContext {
    fn clone(&self) -> Self {
        // Review timers stay with the factory that spawned them; a detached
        // copy reschedules its own when it next estimates an arrival
        Self {
            flight: self.flight.clone(),
            state: self.state,
            current_position: self.current_position.clone(),
            last_active: self.last_active,
            minify_memory: self.minify_memory,
            arrival_review: None,
        }
    }
}

impl FlightContext {
    pub fn new(aircraft_id: impl Into<String>) -> Self {
        Self::from_flight(Flight::new(aircraft_id))
    }

    /// Wrap externally supplied flight metadata in a fresh context
    pub fn from_flight(flight: Flight) -> Self {
        Self {
            flight,
            state: FlightState::Initial,
            current_position: None,
            last_active: Utc::now(),
            minify_memory: false,
            arrival_review: None,
        }
    }

    pub fn aircraft_id(&self) -> &str {
        &self.flight.aircraft_id
    }

    pub fn flight(&self) -> &Flight {
        &self.flight
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn current_position(&self) -> Option<&PositionUpdate> {
        self.current_position.as_ref()
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub(crate) fn enable_minify(&mut self) {
        self.minify_memory = true;
        self.trim_buffer();
    }

    pub(crate) fn set_arrival_review(&mut self, handle: AbortHandle) {
        if let Some(previous) = self.arrival_review.replace(handle) {
            previous.abort();
        }
    }

    pub(crate) fn take_arrival_review(&mut self) -> Option<AbortHandle> {
        self.arrival_review.take()
    }

    /// Consume one position report: insert it in timestamp order, run the
    /// current state's handler, and follow at most one transition.
    pub(crate) fn ingest(
        &mut self,
        update: PositionUpdate,
        detector: &dyn TowDetector,
    ) -> ContextOutcome {
        let mut out = ContextOutcome::default();
        self.last_active = Utc::now();

        if !self.insert_update(update.clone()) {
            trace!(
                aircraft_id = %self.flight.aircraft_id,
                timestamp = %update.timestamp,
                "discarding duplicate report"
            );
            return out;
        }
        self.current_position = Some(update);

        self.run_state_machine(detector, &mut out);

        if self.minify_memory {
            self.trim_buffer();
        }
        out
    }

    /// Timer-driven re-evaluation with no new sample. Only the arrival
    /// theory can ripen this way: once the estimated landing time is more
    /// than the grace period in the past, the estimate becomes final.
    pub(crate) fn review(&mut self) -> ContextOutcome {
        let mut out = ContextOutcome::default();
        if self.state != FlightState::Arriving {
            return out;
        }

        if self.flight.landing_info == InfoConfidence::Estimated
            && let Some(landing_time) = self.flight.landing_time
            && Utc::now() >= landing_time + chrono::Duration::seconds(ARRIVAL_THEORY_GRACE_SECONDS)
        {
            trace!(
                aircraft_id = %self.flight.aircraft_id,
                landing_time = %landing_time,
                "arrival theory ripened without further reports"
            );
            out.events.push(FlightEvent::Landing(self.flight.clone()));
            self.apply_trigger(Trigger::Arrived, &mut out);
        }
        out
    }

    /// Insert a report keeping `updates` ascending by timestamp.
    /// Returns false for a report that is discarded: a duplicate timestamp,
    /// or a straggler from before the anchored takeoff.
    fn insert_update(&mut self, update: PositionUpdate) -> bool {
        if let Some(takeoff) = self.flight.takeoff_time
            && update.timestamp < takeoff
        {
            return false;
        }
        let updates = &mut self.flight.updates;
        let at = updates.partition_point(|u| u.timestamp < update.timestamp);
        if updates.get(at).is_some_and(|u| u.timestamp == update.timestamp) {
            return false;
        }
        updates.insert(at, update);
        true
    }

    fn run_state_machine(&mut self, detector: &dyn TowDetector, out: &mut ContextOutcome) {
        // A handler may fire one trigger; the new state's handler then runs
        // at most once more in the same intake
        for _ in 0..2 {
            let Some(trigger) = self.run_handler(detector, out) else {
                return;
            };
            self.apply_trigger(trigger, out);
        }
    }

    fn run_handler(&mut self, detector: &dyn TowDetector, out: &mut ContextOutcome) -> Option<Trigger> {
        match self.state {
            FlightState::Initial | FlightState::Stationary => {
                departure::handle_stationary(self, out)
            }
            FlightState::Departing => departure::handle_departing(self, detector),
            FlightState::Aerotow => departure::handle_aerotow(self),
            FlightState::Cruise => arrival::handle_cruise(self),
            FlightState::Arriving => arrival::handle_arriving(self, out),
            FlightState::Arrived => self.handle_arrived(out),
        }
    }

    /// The context outlives the flight it completed: the next motion starts
    /// a fresh flight for the same aircraft.
    fn handle_arrived(&mut self, out: &mut ContextOutcome) -> Option<Trigger> {
        let current = self.current_position.clone()?;
        let moving = current
            .known_speed()
            .map(|s| s > MOVING_SPEED_KNOTS)
            .unwrap_or(false);
        if !moving {
            return None;
        }

        trace!(
            aircraft_id = %self.flight.aircraft_id,
            "aircraft moving again after arrival, starting a new flight"
        );
        let mut next = Flight::new(self.flight.aircraft_id.clone());
        next.aircraft_kind = self.flight.aircraft_kind;
        next.updates.push(current);
        self.flight = next;
        self.state = FlightState::Initial;

        departure::handle_stationary(self, out)
    }

    fn apply_trigger(&mut self, trigger: Trigger, out: &mut ContextOutcome) {
        let Some(next) = transition(self.state, trigger) else {
            // Handlers only fire triggers their state accepts
            warn!(
                aircraft_id = %self.flight.aircraft_id,
                state = ?self.state,
                ?trigger,
                "trigger rejected by transition table"
            );
            return;
        };

        trace!(
            aircraft_id = %self.flight.aircraft_id,
            from = ?self.state,
            to = ?next,
            ?trigger,
            "state transition"
        );
        self.state = next;

        match next {
            FlightState::Arriving => {
                out.cancel_review = true;
            }
            FlightState::Arrived => {
                self.finish_flight(out);
            }
            _ => {}
        }

        if self.minify_memory {
            self.trim_buffer();
        }
    }

    /// Completion check on entering `Arrived`
    fn finish_flight(&mut self, out: &mut ContextOutcome) {
        out.cancel_review = true;

        let mut issues = Vec::new();
        if self.flight.landing_location.is_none() {
            issues.push(CompletionIssue::LandingLocationUnknown);
        }
        if self.flight.landing_heading.is_none() {
            issues.push(CompletionIssue::LandingHeadingUnknown);
        }
        if !issues.is_empty() {
            out.events.push(FlightEvent::CompletedWithErrors(CompletedWithErrors {
                flight: self.flight.clone(),
                issues,
            }));
        }
    }

    /// Under memory pressure only a tail of the buffer is kept. The full
    /// departure record stays until the launch is classified: the winch
    /// check needs the first samples of the flight.
    pub(crate) fn trim_buffer(&mut self) {
        let keep = match self.state {
            FlightState::Departing | FlightState::Aerotow => return,
            FlightState::Initial | FlightState::Stationary => MINIFIED_GROUND_SAMPLES,
            FlightState::Cruise | FlightState::Arriving | FlightState::Arrived => {
                MINIFIED_AIRBORNE_SAMPLES
            }
        };
        let len = self.flight.updates.len();
        if len > keep {
            self.flight.updates.drain(..len - keep);
        }
    }
}
