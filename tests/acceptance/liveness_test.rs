//! Steady pulse train: the board stays classified as running and no
//! shutdown is ever requested.

use super::common::{harness, push_pulse_train, PULSE_PERIOD};
use ups_gpio::Level;

#[test]
fn test_steady_pulse_train_reports_running() {
    let mut h = harness();
    let steps: u64 = 66; // roughly 30 s of simulated traffic
    push_pulse_train(&h.ctl, 1_000_000_000, steps + 1);

    h.service.acquire().unwrap();
    for step in 0..steps {
        h.clock.advance(PULSE_PERIOD);
        h.service.step().unwrap();
        let snap = h.state.snapshot();
        assert!(snap.ups_running, "liveness lost at step {step}");
        assert!(!snap.should_shutdown, "shutdown requested at step {step}");
    }

    let snap = h.state.snapshot();
    assert_eq!(snap.last_interval, Some(PULSE_PERIOD));
    assert_eq!(snap.stats.count(), steps);
    assert_eq!(snap.stats.min(), Some(PULSE_PERIOD));
    assert_eq!(snap.stats.max(), Some(PULSE_PERIOD));

    // Samples happened (the gate opens in the low phase) but every
    // read saw the line high: no trigger ever fired.
    assert!(snap.last_sample_at.is_some());
    assert!(h.trigger_rx.try_recv().is_err());
}

#[test]
fn test_heartbeat_alternates_with_the_train() {
    let mut h = harness();
    push_pulse_train(&h.ctl, 1_000_000_000, 4);

    h.service.acquire().unwrap();
    h.clock.advance(PULSE_PERIOD);
    h.service.step().unwrap();
    let writes = h.ctl.writes();
    assert_eq!(writes, vec![Level::Low, Level::High]);

    h.clock.advance(PULSE_PERIOD);
    h.service.step().unwrap();
    // Toggle low, then the first gated sample restores the same low.
    let writes = h.ctl.writes();
    assert_eq!(
        writes,
        vec![Level::Low, Level::High, Level::Low, Level::Low]
    );

    h.clock.advance(PULSE_PERIOD);
    h.service.step().unwrap();
    assert_eq!(h.ctl.writes().last(), Some(&Level::High));
}
