//! The combined pulse/heartbeat flow.
//!
//! Pulse monitoring and heartbeat driving act on the same physical
//! line pair and must be serialized, so they run as one flow: wait
//! for an edge, toggle, then attempt a sample when the gate allows
//! it. Steady-state timeouts and wait errors are survivable; losing a
//! direction on the data line is not.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};
use ups_common::{DaemonConfig, ProtocolState, UpsResult};
use ups_gpio::GpioChip;

use crate::clock::Clock;
use crate::heartbeat::{DataLine, SampleGate};
use crate::monitor::PulseMonitor;
use crate::shutdown::ShutdownTrigger;

/// Consumer label held on the clock line.
pub const CLOCK_CONSUMER: &str = "upspicod-clock-read";

/// Exclusive owner of both protocol lines for the process lifetime.
pub struct HeartbeatService<C: GpioChip, K: Clock> {
    monitor: PulseMonitor<C::Events>,
    line: DataLine<C>,
    gate: SampleGate,
    clock: K,
    state: Arc<ProtocolState>,
    trigger: ShutdownTrigger,
    liveness_threshold: Duration,
    max_cycles: u64,
}

impl<C: GpioChip, K: Clock> HeartbeatService<C, K> {
    /// Claim the clock line for edge events and the data line as an
    /// output, then assemble the flow.
    pub fn new(
        mut chip: C,
        clock: K,
        state: Arc<ProtocolState>,
        trigger: ShutdownTrigger,
        config: &DaemonConfig,
    ) -> UpsResult<Self> {
        let events = chip.watch_falling_edges(config.clock_pin, CLOCK_CONSUMER)?;
        let line = DataLine::open(chip, config.pulse_pin)?;
        Ok(Self {
            monitor: PulseMonitor::new(events, &config.timing),
            line,
            gate: SampleGate::new(config.timing.sample_interval),
            clock,
            state,
            trigger,
            liveness_threshold: config.timing.liveness_threshold,
            max_cycles: 0,
        })
    }

    /// Stop after `cycles` loop iterations; 0 means run forever.
    #[must_use]
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = cycles;
        self
    }

    /// Wait for the pulse train and seed the protocol state.
    ///
    /// The first edge only seeds the timestamp: no interval, no
    /// liveness classification, no heartbeat toggle.
    pub fn acquire(&mut self) -> UpsResult<()> {
        let edge = self.monitor.acquire_first()?;
        self.state.seed_pulse(edge.timestamp_ns, self.clock.wall());
        info!("Got a pulse, starting normal operation");
        Ok(())
    }

    /// One loop iteration: bounded edge wait, heartbeat toggle on an
    /// edge, then a sampling attempt when the gate allows it.
    pub fn step(&mut self) -> UpsResult<()> {
        match self.monitor.next_pulse() {
            Ok(Some(edge)) => {
                let bit = self.line.toggle();
                let update = self.state.record_pulse(
                    edge.timestamp_ns,
                    self.clock.wall(),
                    bit.is_high(),
                    self.liveness_threshold,
                );
                trace!(
                    timestamp_ns = edge.timestamp_ns,
                    interval = ?update.interval,
                    ups_running = update.ups_running,
                    "Pulse"
                );
            }
            Ok(None) => warn!("No pulse from UPS Pico"),
            Err(e) => warn!(error = %e, "Error while waiting for pulse"),
        }
        self.maybe_sample()
    }

    /// Acquire the pulse train, then loop until a fatal error or the
    /// cycle limit.
    pub fn run(&mut self) -> UpsResult<()> {
        self.acquire()?;
        let mut cycles: u64 = 0;
        loop {
            self.step()?;
            cycles += 1;
            if self.max_cycles > 0 && cycles >= self.max_cycles {
                info!(cycles, "Cycle limit reached, stopping");
                return Ok(());
            }
        }
    }

    fn maybe_sample(&mut self) -> UpsResult<()> {
        let now = self.clock.now();
        if !self.gate.ready(self.line.bit(), now) {
            return Ok(());
        }
        self.gate.mark(now);
        if let Some(level) = self.line.sample()? {
            let requests_shutdown = level.is_low();
            self.state
                .record_sample(requests_shutdown, self.clock.wall());
            debug!(?level, requests_shutdown, "Sampled shutdown-request bit");
            if requests_shutdown && !self.trigger.fire() {
                warn!("Shutdown already notified");
            }
        }
        Ok(())
    }
}
