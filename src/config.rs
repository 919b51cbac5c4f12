use serde::{Deserialize, Serialize};

/// Tunables for the flight context factory.
/// Read-only once the factory has been constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerOptions {
    /// Idle time after which a context is expired and disposed, in seconds
    pub context_expiration_seconds: u64,
    /// How often the expiry sweeper runs, in seconds
    pub sweep_interval_seconds: u64,
    /// Trim position buffers aggressively after intakes and state transitions
    pub minify_memory_pressure: bool,
    /// Whether neighbour data is available for aerotow detection
    pub nearby_runtime: bool,
    /// Buffered capacity of each event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            context_expiration_seconds: 300,
            sweep_interval_seconds: 10,
            minify_memory_pressure: false,
            nearby_runtime: false,
            event_channel_capacity: 64,
        }
    }
}
