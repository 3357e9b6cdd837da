//! Common utilities for the acceptance scenarios.

#![allow(dead_code)] // Not every helper is used by every scenario

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ups_common::{DaemonConfig, ProtocolState, UpsResult};
use ups_engine::{HeartbeatService, ManualClock, ShutdownTrigger, SystemControl};
use ups_gpio::{SimChip, SimController};

/// Pulse period the scripted scenarios emit, matching the board's
/// normal 400-500 ms cadence.
pub const PULSE_PERIOD: Duration = Duration::from_millis(450);

/// System control stub that records halt requests instead of running
/// a command.
#[derive(Clone, Default)]
pub struct RecordingSystem {
    calls: Arc<Mutex<Vec<u64>>>,
}

impl RecordingSystem {
    /// Delay arguments of every halt request so far.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }
}

impl SystemControl for RecordingSystem {
    fn schedule_shutdown(&mut self, delay_minutes: u64) -> UpsResult<()> {
        self.calls.lock().unwrap().push(delay_minutes);
        Ok(())
    }
}

/// Production defaults with the grace sleep shortened to keep the
/// shutdown scenario fast.
pub fn test_config() -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.timing.shutdown_grace = Duration::from_millis(5);
    config
}

/// A fully wired engine over the scripted simulator.
pub struct Harness {
    pub service: HeartbeatService<SimChip, ManualClock>,
    pub ctl: SimController,
    pub clock: ManualClock,
    pub state: Arc<ProtocolState>,
    pub trigger_rx: Receiver<()>,
}

/// Build the engine exactly as the daemon does, minus the threads.
pub fn harness() -> Harness {
    let (chip, ctl) = SimChip::scripted();
    let clock = ManualClock::new();
    let state = Arc::new(ProtocolState::new());
    let (trigger, trigger_rx) = ShutdownTrigger::pair();
    let service = HeartbeatService::new(
        chip,
        clock.clone(),
        Arc::clone(&state),
        trigger,
        &test_config(),
    )
    .expect("claiming simulated lines cannot fail");
    Harness {
        service,
        ctl,
        clock,
        state,
        trigger_rx,
    }
}

/// Queue `count` falling edges spaced one pulse period apart starting
/// at `start_ns`. Returns the timestamp one period past the last edge.
pub fn push_pulse_train(ctl: &SimController, start_ns: u64, count: u64) -> u64 {
    let period_ns = u64::try_from(PULSE_PERIOD.as_nanos()).unwrap();
    let mut ts = start_ns;
    for _ in 0..count {
        ctl.push_edge(ts);
        ts += period_ns;
    }
    ts
}
