//! Missing pulse train at startup: a fatal error, with every line
//! handle released.

use super::common::harness;
use ups_common::UpsError;

#[test]
fn test_missing_pulse_train_is_fatal() {
    let mut h = harness();

    // Nothing scripted: the initial wait and the extended retry both
    // time out.
    let err = h.service.acquire().unwrap_err();
    assert!(matches!(err, UpsError::NoPulse(_)));

    // Both protocol lines were claimed during construction and are
    // released with the service.
    assert_eq!(h.ctl.open_handles(), 2);
    drop(h.service);
    assert_eq!(h.ctl.open_handles(), 0);
}

#[test]
fn test_run_propagates_the_startup_fault() {
    let mut h = harness();
    assert!(matches!(h.service.run(), Err(UpsError::NoPulse(_))));
}
