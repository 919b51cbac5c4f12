use serde::{Deserialize, Serialize};

/// Flight phase of a tracked aircraft.
///
/// `Arrived` is terminal for the current flight; the context resets to
/// `Initial` with a fresh flight when the aircraft moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightState {
    Initial,
    Stationary,
    Departing,
    Aerotow,
    Cruise,
    Arriving,
    Arrived,
}

/// Trigger fired by a state handler to request a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Depart,
    TrackAerotow,
    LaunchCompleted,
    Landing,
    LandingAborted,
    Arrived,
}

/// The transition table. Returns None for a trigger the current state
/// does not accept.
pub(crate) fn transition(state: FlightState, trigger: Trigger) -> Option<FlightState> {
    use FlightState::*;

    match (state, trigger) {
        (Initial | Stationary, Trigger::Depart) => Some(Departing),
        (Departing, Trigger::TrackAerotow) => Some(Aerotow),
        (Departing, Trigger::LaunchCompleted) => Some(Cruise),
        (Departing, Trigger::Landing) => Some(Arriving),
        (Aerotow, Trigger::LaunchCompleted) => Some(Cruise),
        (Cruise, Trigger::Landing) => Some(Arriving),
        (Arriving, Trigger::LandingAborted) => Some(Cruise),
        (Arriving, Trigger::Arrived) => Some(Arrived),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_full_launch_and_landing_path() {
        use FlightState::*;

        assert_eq!(transition(Initial, Trigger::Depart), Some(Departing));
        assert_eq!(transition(Stationary, Trigger::Depart), Some(Departing));
        assert_eq!(transition(Departing, Trigger::TrackAerotow), Some(Aerotow));
        assert_eq!(transition(Aerotow, Trigger::LaunchCompleted), Some(Cruise));
        assert_eq!(transition(Departing, Trigger::LaunchCompleted), Some(Cruise));
        assert_eq!(transition(Cruise, Trigger::Landing), Some(Arriving));
        assert_eq!(transition(Arriving, Trigger::LandingAborted), Some(Cruise));
        assert_eq!(transition(Arriving, Trigger::Arrived), Some(Arrived));
    }

    #[test]
    fn departure_can_be_aborted_into_an_arrival() {
        assert_eq!(
            transition(FlightState::Departing, Trigger::Landing),
            Some(FlightState::Arriving)
        );
    }

    #[test]
    fn rejects_triggers_the_state_does_not_accept() {
        assert_eq!(transition(FlightState::Initial, Trigger::Landing), None);
        assert_eq!(transition(FlightState::Cruise, Trigger::Depart), None);
        assert_eq!(transition(FlightState::Arrived, Trigger::Landing), None);
        assert_eq!(transition(FlightState::Aerotow, Trigger::Landing), None);
    }
}
