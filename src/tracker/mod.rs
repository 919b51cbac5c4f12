//! Per-aircraft flight tracking.
//!
//! The factory demultiplexes a shared stream of position reports into
//! per-aircraft [`FlightContext`]s, creates contexts lazily, expires idle
//! ones on a periodic sweep, and fans each context's events out through the
//! factory's [`EventBus`].

mod arrival;
mod context;
mod departure;
mod state;
mod towing;

pub use context::FlightContext;
pub use state::FlightState;
pub use towing::{DisabledTowDetector, Encounter, EncounterKind, TowDetector};

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tracing::{info, trace};

use crate::config::TrackerOptions;
use crate::events::{EventBus, FlightEvent};
use crate::flight::Flight;
use crate::position::PositionUpdate;
use towing::VicinityTowDetector;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("aircraft id must not be empty")]
    EmptyAircraftId,
}

/// Map entry holding one aircraft's context behind its serialisation lock
pub(crate) struct ContextSlot {
    pub(crate) context: Mutex<FlightContext>,
}

pub(crate) type ContextMap = Arc<DashMap<String, Arc<ContextSlot>>>;

/// Routes position reports to per-aircraft flight contexts.
///
/// The map allows concurrent enqueues for distinct aircraft; all intakes for
/// one aircraft are serialised behind that context's lock. Events are
/// published only after the lock is released, in the order the state machine
/// produced them.
#[derive(Clone)]
pub struct FlightContextFactory {
    contexts: ContextMap,
    bus: EventBus,
    options: TrackerOptions,
    detector: Arc<dyn TowDetector>,
}

impl FlightContextFactory {
    pub fn new(options: TrackerOptions) -> Self {
        let contexts: ContextMap = Arc::new(DashMap::new());
        let detector: Arc<dyn TowDetector> = if options.nearby_runtime {
            Arc::new(VicinityTowDetector::new(Arc::clone(&contexts)))
        } else {
            Arc::new(DisabledTowDetector)
        };
        Self {
            bus: EventBus::new(options.event_channel_capacity),
            contexts,
            options,
            detector,
        }
    }

    /// Use an externally supplied aerotow collaborator instead of the
    /// built-in vicinity scan
    pub fn with_detector(options: TrackerOptions, detector: Arc<dyn TowDetector>) -> Self {
        Self {
            bus: EventBus::new(options.event_channel_capacity),
            contexts: Arc::new(DashMap::new()),
            options,
            detector,
        }
    }

    /// The factory's event streams
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Number of aircraft currently tracked
    pub fn tracked_count(&self) -> usize {
        self.contexts.len()
    }

    /// Route a batch of reports to their aircraft's contexts.
    ///
    /// Reports without an aircraft id are dropped per entry. For one aircraft
    /// the batch is processed in the order given; no ordering holds between
    /// aircraft. Never blocks on IO and no error escapes.
    pub async fn enqueue(&self, reports: Vec<PositionUpdate>) {
        let mut groups: HashMap<String, Vec<PositionUpdate>> = HashMap::new();
        for report in reports {
            if report.aircraft_id.trim().is_empty() {
                trace!("discarding report without aircraft id");
                counter!("flight_events.reports_discarded_total").increment(1);
                continue;
            }
            groups
                .entry(report.aircraft_id.clone())
                .or_default()
                .push(report);
        }

        for (aircraft_id, batch) in groups {
            let slot = self.slot(&aircraft_id);
            let mut events = Vec::new();
            {
                let mut context = slot.context.lock().await;
                for report in batch {
                    let outcome = context.ingest(report, self.detector.as_ref());
                    if outcome.cancel_review
                        && let Some(timer) = context.take_arrival_review()
                    {
                        timer.abort();
                    }
                    if let Some(at) = outcome.schedule_review_at {
                        let timer =
                            spawn_arrival_review(Arc::downgrade(&slot), self.bus.clone(), at);
                        context.set_arrival_review(timer);
                    }
                    events.extend(outcome.events);
                }
            }
            for event in events {
                self.bus.publish(event);
            }
        }

        gauge!("flight_events.tracked_contexts").set(self.contexts.len() as f64);
    }

    /// Attach a context, replacing any existing one for the same aircraft.
    /// This is the inverse of [`detach`](Self::detach).
    pub async fn attach(&self, mut context: FlightContext) -> Result<(), FactoryError> {
        if context.aircraft_id().trim().is_empty() {
            return Err(FactoryError::EmptyAircraftId);
        }
        if self.options.minify_memory_pressure {
            context.enable_minify();
        }

        let aircraft_id = context.aircraft_id().to_string();
        let slot = Arc::new(ContextSlot {
            context: Mutex::new(context),
        });
        if let Some(previous) = self.contexts.insert(aircraft_id, slot) {
            let mut previous = previous.context.lock().await;
            if let Some(timer) = previous.take_arrival_review() {
                timer.abort();
            }
        }
        Ok(())
    }

    /// Construct a context from externally supplied flight metadata and
    /// attach it
    pub async fn attach_flight(&self, flight: Flight) -> Result<(), FactoryError> {
        self.attach(FlightContext::from_flight(flight)).await
    }

    /// Snapshot of the tracked context for an aircraft, if any
    pub async fn get_context(&self, aircraft_id: &str) -> Option<FlightContext> {
        let slot = Arc::clone(self.contexts.get(aircraft_id)?.value());
        let context = slot.context.lock().await;
        Some(context.clone())
    }

    /// Remove and return the context for an aircraft.
    ///
    /// This is an explicit transfer of ownership to the caller: timers are
    /// cancelled but no disposed event is emitted.
    pub async fn detach(&self, aircraft_id: &str) -> Option<FlightContext> {
        let (_, slot) = self.contexts.remove(aircraft_id)?;
        let mut context = slot.context.lock().await;
        if let Some(timer) = context.take_arrival_review() {
            timer.abort();
        }
        Some(context.clone())
    }

    /// Spawn the periodic sweep that expires idle contexts
    pub fn start_expiry_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let factory = self.clone();
        let period = Duration::from_secs(factory.options.sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first tick (immediate execution)
            interval.tick().await;
            loop {
                interval.tick().await;
                factory.sweep_expired().await;
            }
        })
    }

    /// Dispose every context whose last intake is older than the configured
    /// expiration. Victims are collected first and removed one by one; no map
    /// shard lock is held while events are emitted.
    pub async fn sweep_expired(&self) {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.options.context_expiration_seconds as i64);

        let victims: Vec<String> = self
            .contexts
            .iter()
            .filter_map(|entry| {
                // A context busy with an intake is active by definition
                let context = entry.value().context.try_lock().ok()?;
                (context.last_active() < cutoff).then(|| entry.key().clone())
            })
            .collect();

        for aircraft_id in victims {
            // Re-check under removal: the context may have received a report
            // since the snapshot
            let removed = self.contexts.remove_if(&aircraft_id, |_, slot| {
                slot.context
                    .try_lock()
                    .map(|context| context.last_active() < cutoff)
                    .unwrap_or(false)
            });
            let Some((_, slot)) = removed else {
                continue;
            };

            let mut context = slot.context.lock().await;
            if let Some(timer) = context.take_arrival_review() {
                timer.abort();
            }
            let flight = context.flight().clone();
            drop(context);

            info!(aircraft_id = %flight.aircraft_id, "expiring idle flight context");
            counter!("flight_events.contexts_expired_total").increment(1);
            self.bus.publish(FlightEvent::ContextDisposed(flight));
        }

        gauge!("flight_events.tracked_contexts").set(self.contexts.len() as f64);
    }

    /// Fetch or lazily create the slot for an aircraft
    fn slot(&self, aircraft_id: &str) -> Arc<ContextSlot> {
        if let Some(existing) = self.contexts.get(aircraft_id) {
            return Arc::clone(existing.value());
        }

        let mut context = FlightContext::new(aircraft_id);
        if self.options.minify_memory_pressure {
            context.enable_minify();
        }
        let slot = Arc::new(ContextSlot {
            context: Mutex::new(context),
        });
        // entry() closes the creation race: the first writer wins
        Arc::clone(
            self.contexts
                .entry(aircraft_id.to_string())
                .or_insert(slot)
                .value(),
        )
    }
}

/// Delayed re-evaluation of an arrival theory. Holds only a weak reference:
/// a disposed context lets the timer die quietly.
fn spawn_arrival_review(
    slot: Weak<ContextSlot>,
    bus: EventBus,
    at: DateTime<Utc>,
) -> AbortHandle {
    let task = tokio::spawn(async move {
        let wait = (at - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        let Some(slot) = slot.upgrade() else {
            return;
        };
        let outcome = {
            let mut context = slot.context.lock().await;
            context.review()
        };
        for event in outcome.events {
            bus.publish(event);
        }
    });
    task.abort_handle()
}
