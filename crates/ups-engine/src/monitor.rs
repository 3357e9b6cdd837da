//! Clock-line pulse acquisition.
//!
//! All waits are bounded. Steady-state timeouts and wait errors are
//! survivable and reported by the caller; only a missing pulse train
//! at startup is fatal, after one extended retry to ride out board
//! cold-start.

use std::time::Duration;

use tracing::{info, warn};
use ups_common::{TimingConfig, UpsError, UpsResult};
use ups_gpio::{EdgeSource, PulseEdge};

/// Bounded-wait reader of falling edges on the clock line.
pub struct PulseMonitor<E: EdgeSource> {
    events: E,
    edge_wait: Duration,
    first_pulse_wait: Duration,
    first_pulse_retry_wait: Duration,
}

impl<E: EdgeSource> PulseMonitor<E> {
    /// Wrap an edge source with the configured wait bounds.
    pub fn new(events: E, timing: &TimingConfig) -> Self {
        Self {
            events,
            edge_wait: timing.edge_wait,
            first_pulse_wait: timing.first_pulse_wait,
            first_pulse_retry_wait: timing.first_pulse_retry_wait,
        }
    }

    /// Wait for the pulse train to appear.
    ///
    /// A wait error during the initial window is tolerated like a
    /// timeout; no edge after the extended retry means no board is
    /// present and the protocol cannot start.
    pub fn acquire_first(&mut self) -> UpsResult<PulseEdge> {
        info!("Waiting for first pulse");
        match self.events.wait_edge(self.first_pulse_wait) {
            Ok(Some(edge)) => return Ok(edge),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Error while waiting for first pulse"),
        }
        warn!(
            "No pulse from UPS Pico, check that it is running and on the correct pin; waiting longer"
        );
        match self.events.wait_edge(self.first_pulse_retry_wait)? {
            Some(edge) => Ok(edge),
            None => Err(UpsError::NoPulse(format!(
                "no falling edge within {}",
                humantime::format_duration(self.first_pulse_wait + self.first_pulse_retry_wait)
            ))),
        }
    }

    /// Bounded steady-state wait for the next edge. `None` means the
    /// wait elapsed quietly.
    pub fn next_pulse(&mut self) -> UpsResult<Option<PulseEdge>> {
        self.events.wait_edge(self.edge_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ups_gpio::{GpioChip, SimChip};

    fn monitor_from(ctl_setup: impl FnOnce(&ups_gpio::SimController)) -> PulseMonitor<ups_gpio::sim::SimEvents> {
        let (mut chip, ctl) = SimChip::scripted();
        ctl_setup(&ctl);
        let events = chip.watch_falling_edges(27, "test").unwrap();
        PulseMonitor::new(events, &TimingConfig::default())
    }

    #[test]
    fn test_first_edge_within_initial_wait() {
        let mut monitor = monitor_from(|ctl| ctl.push_edge(1_000));
        assert_eq!(monitor.acquire_first().unwrap().timestamp_ns, 1_000);
    }

    #[test]
    fn test_first_edge_after_extended_retry() {
        let mut monitor = monitor_from(|ctl| {
            ctl.push_timeout();
            ctl.push_edge(2_000);
        });
        assert_eq!(monitor.acquire_first().unwrap().timestamp_ns, 2_000);
    }

    #[test]
    fn test_initial_wait_error_tolerated() {
        let mut monitor = monitor_from(|ctl| {
            ctl.push_wait_error("transient");
            ctl.push_edge(3_000);
        });
        assert_eq!(monitor.acquire_first().unwrap().timestamp_ns, 3_000);
    }

    #[test]
    fn test_no_pulse_train_is_fatal() {
        let mut monitor = monitor_from(|ctl| {
            ctl.push_timeout();
            ctl.push_timeout();
        });
        assert!(matches!(
            monitor.acquire_first(),
            Err(UpsError::NoPulse(_))
        ));
    }

    #[test]
    fn test_retry_wait_error_propagates() {
        let mut monitor = monitor_from(|ctl| {
            ctl.push_timeout();
            ctl.push_wait_error("chip gone");
        });
        assert!(matches!(monitor.acquire_first(), Err(UpsError::Gpio(_))));
    }

    #[test]
    fn test_next_pulse_passes_timeouts_through() {
        let mut monitor = monitor_from(|ctl| {
            ctl.push_edge(4_000);
            ctl.push_timeout();
        });
        assert_eq!(
            monitor.next_pulse().unwrap(),
            Some(PulseEdge {
                timestamp_ns: 4_000
            })
        );
        assert_eq!(monitor.next_pulse().unwrap(), None);
    }
}
