//! Pulse train collapse with a low shutdown bit: exactly one halt
//! command runs, and the executor holds the grace period before the
//! process exit path.

use std::time::{Duration, Instant};

use super::common::{harness, push_pulse_train, test_config, RecordingSystem, PULSE_PERIOD};
use ups_engine::ShutdownExecutor;
use ups_gpio::Level;

#[test]
fn test_stopped_pulse_train_runs_one_shutdown() {
    let mut h = harness();

    // Healthy traffic first: seed plus three edges, ending high.
    push_pulse_train(&h.ctl, 1_000_000_000, 4);
    h.service.acquire().unwrap();
    for _ in 0..3 {
        h.clock.advance(PULSE_PERIOD);
        h.service.step().unwrap();
    }
    assert!(h.state.snapshot().ups_running);

    // The board's supply collapses: one last slow edge drops the
    // liveness classification and returns the bit to its low phase.
    h.ctl.push_edge(3_550_000_000);
    h.clock.advance(Duration::from_secs(2));
    h.service.step().unwrap();
    let snap = h.state.snapshot();
    assert!(!snap.ups_running);
    assert!(!snap.should_shutdown);

    // Silence, and the data line reads low once the gate reopens.
    h.ctl.push_timeout();
    h.ctl.push_sample(Level::Low);
    h.clock.advance(Duration::from_secs(10));
    h.service.step().unwrap();
    assert!(h.state.snapshot().should_shutdown);

    // The executor consumes the one pending trigger, invokes the halt
    // command once, and sleeps out the (shortened) grace period.
    let system = RecordingSystem::default();
    let executor = ShutdownExecutor::new(h.trigger_rx, system.clone(), &test_config().timing);
    let started = Instant::now();
    assert!(executor.run());
    assert!(started.elapsed() >= Duration::from_millis(5));
    assert_eq!(system.calls(), vec![1]);

    // Further low samples after the executor is gone are harmless;
    // the command does not run again.
    h.ctl.push_timeout();
    h.ctl.push_sample(Level::Low);
    h.clock.advance(Duration::from_secs(10));
    h.service.step().unwrap();
    assert!(h.state.snapshot().should_shutdown);
    assert_eq!(system.calls(), vec![1]);
}
