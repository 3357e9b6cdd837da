//! Periodic status logging.
//!
//! Pure observability: takes a snapshot of the protocol state at a
//! fixed interval and logs one summary line. Holds the state lock
//! only for the snapshot copy.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use ups_common::{ProtocolSnapshot, ProtocolState};

/// Logs a one-line protocol summary at a fixed interval.
pub struct StatusReporter {
    state: Arc<ProtocolState>,
    interval: Duration,
}

impl StatusReporter {
    /// Report on `state` every `interval`.
    #[must_use]
    pub fn new(state: Arc<ProtocolState>, interval: Duration) -> Self {
        Self { state, interval }
    }

    /// Loop forever, sleeping between reports.
    pub fn run(&self) {
        loop {
            std::thread::sleep(self.interval);
            info!("{}", summarize(&self.state.snapshot()));
        }
    }
}

fn summarize(snapshot: &ProtocolSnapshot) -> String {
    let last_pulse = snapshot.last_pulse_at.map_or_else(
        || "never".to_string(),
        |at| humantime::format_rfc3339_seconds(at).to_string(),
    );
    let last_interval = snapshot.last_interval.map_or_else(
        || "none".to_string(),
        |interval| humantime::format_duration(interval).to_string(),
    );
    let mut line = format!(
        "Last pulse: {last_pulse}, last interval: {last_interval}, ups running: {}",
        snapshot.ups_running
    );
    let stats = &snapshot.stats;
    if let (Some(min), Some(max), Some(mean)) = (stats.min(), stats.max(), stats.mean()) {
        line.push_str(&format!(
            ", intervals: {} (min {}, max {}, mean {})",
            stats.count(),
            humantime::format_duration(min),
            humantime::format_duration(max),
            humantime::format_duration(mean),
        ));
    } else {
        line.push_str(", intervals: 0");
    }
    line
}
