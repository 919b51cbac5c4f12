//! Event fan-out for the flight context factory.
//!
//! Five broadcast streams mirror the per-context events; each subscription
//! receives events from all tracked contexts. Delivery is best-effort: a slow
//! or dropped receiver cannot poison the stream for other subscribers, and
//! publishing with nobody listening is not an error.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::flight::Flight;

/// Why a flight completed with incomplete arrival data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionIssue {
    LandingLocationUnknown,
    LandingHeadingUnknown,
}

/// Payload of the completed-with-errors stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedWithErrors {
    /// Snapshot of the flight at the moment it was completed
    pub flight: Flight,
    pub issues: Vec<CompletionIssue>,
}

/// A domain event produced by a flight context.
/// Every payload is a snapshot of the Flight at the moment the event fired.
#[derive(Debug, Clone)]
pub(crate) enum FlightEvent {
    Takeoff(Flight),
    RadarContact(Flight),
    Landing(Flight),
    CompletedWithErrors(CompletedWithErrors),
    ContextDisposed(Flight),
}

impl FlightEvent {
    fn name(&self) -> &'static str {
        match self {
            FlightEvent::Takeoff(_) => "takeoff",
            FlightEvent::RadarContact(_) => "radar_contact",
            FlightEvent::Landing(_) => "landing",
            FlightEvent::CompletedWithErrors(_) => "completed_with_errors",
            FlightEvent::ContextDisposed(_) => "context_disposed",
        }
    }
}

/// Broadcast hub for the factory's five event streams
#[derive(Debug, Clone)]
pub struct EventBus {
    takeoff: broadcast::Sender<Flight>,
    radar_contact: broadcast::Sender<Flight>,
    landing: broadcast::Sender<Flight>,
    completed_with_errors: broadcast::Sender<CompletedWithErrors>,
    context_disposed: broadcast::Sender<Flight>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (takeoff, _) = broadcast::channel(capacity);
        let (radar_contact, _) = broadcast::channel(capacity);
        let (landing, _) = broadcast::channel(capacity);
        let (completed_with_errors, _) = broadcast::channel(capacity);
        let (context_disposed, _) = broadcast::channel(capacity);
        Self {
            takeoff,
            radar_contact,
            landing,
            completed_with_errors,
            context_disposed,
        }
    }

    pub fn subscribe_takeoff(&self) -> broadcast::Receiver<Flight> {
        self.takeoff.subscribe()
    }

    pub fn subscribe_radar_contact(&self) -> broadcast::Receiver<Flight> {
        self.radar_contact.subscribe()
    }

    pub fn subscribe_landing(&self) -> broadcast::Receiver<Flight> {
        self.landing.subscribe()
    }

    pub fn subscribe_completed_with_errors(&self) -> broadcast::Receiver<CompletedWithErrors> {
        self.completed_with_errors.subscribe()
    }

    pub fn subscribe_context_disposed(&self) -> broadcast::Receiver<Flight> {
        self.context_disposed.subscribe()
    }

    pub(crate) fn publish(&self, event: FlightEvent) {
        counter!("flight_events.events_published_total", "event" => event.name()).increment(1);

        // A send error only means nobody is subscribed right now
        match event {
            FlightEvent::Takeoff(flight) => {
                let _ = self.takeoff.send(flight);
            }
            FlightEvent::RadarContact(flight) => {
                let _ = self.radar_contact.send(flight);
            }
            FlightEvent::Landing(flight) => {
                let _ = self.landing.send(flight);
            }
            FlightEvent::CompletedWithErrors(payload) => {
                let _ = self.completed_with_errors.send(payload);
            }
            FlightEvent::ContextDisposed(flight) => {
                let _ = self.context_disposed.send(flight);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(FlightEvent::Takeoff(Flight::new("DDA5BA")));
    }

    #[tokio::test]
    async fn each_stream_reaches_all_of_its_subscribers() {
        let bus = EventBus::new(4);
        let mut first = bus.subscribe_landing();
        let mut second = bus.subscribe_landing();
        let mut takeoffs = bus.subscribe_takeoff();

        bus.publish(FlightEvent::Landing(Flight::new("DDA5BA")));

        assert_eq!(first.recv().await.unwrap().aircraft_id, "DDA5BA");
        assert_eq!(second.recv().await.unwrap().aircraft_id, "DDA5BA");
        assert!(takeoffs.try_recv().is_err());
    }
}
