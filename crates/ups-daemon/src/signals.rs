//! Signal handling and the process exit latch.
//!
//! SIGTERM and SIGINT request a clean exit. Signal handlers must be
//! async-signal-safe, so they only set static atomic flags; a small
//! poll thread forwards the first flag seen to the exit latch. The
//! latch carries the first exit reason recorded by any flow.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;
use ups_common::UpsError;

/// Signal types the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - graceful termination request.
    Terminate,
    /// SIGINT - interrupt (Ctrl+C).
    Interrupt,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Why the process is exiting.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// The shutdown sequence ran to completion.
    ShutdownComplete,
    /// The pulse/heartbeat flow stopped at its cycle limit.
    CycleLimit,
    /// A termination signal arrived.
    Signal(SignalKind),
    /// A flow hit a fatal error.
    Fault(UpsError),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ShutdownComplete => write!(f, "shutdown sequence complete"),
            ExitReason::CycleLimit => write!(f, "cycle limit reached"),
            ExitReason::Signal(kind) => write!(f, "{kind} received"),
            ExitReason::Fault(e) => write!(f, "fatal error: {e}"),
        }
    }
}

/// First-wins exit latch the daemon flows notify.
#[derive(Default)]
pub struct ExitLatch {
    reason: Mutex<Option<ExitReason>>,
    cond: Condvar,
}

impl ExitLatch {
    /// An empty latch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `reason` unless one is already set, and wake the waiter.
    pub fn notify(&self, reason: ExitReason) {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(reason);
            self.cond.notify_all();
        }
    }

    /// Block until a reason is recorded.
    pub fn wait(&self) -> ExitReason {
        let mut slot = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(reason) = slot.as_ref() {
                return reason.clone();
            }
            slot = self
                .cond
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Install SIGTERM and SIGINT handlers that feed `latch`.
pub fn install(latch: &Arc<ExitLatch>) {
    static TERM_FLAG: AtomicBool = AtomicBool::new(false);
    static INT_FLAG: AtomicBool = AtomicBool::new(false);

    extern "C" fn term_handler(_: libc::c_int) {
        TERM_FLAG.store(true, Ordering::Relaxed);
    }

    extern "C" fn int_handler(_: libc::c_int) {
        INT_FLAG.store(true, Ordering::Relaxed);
    }

    // Set up the actual signal handlers using libc.
    unsafe {
        libc::signal(libc::SIGTERM, term_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, int_handler as libc::sighandler_t);
    }

    // Poll the static flags and forward the first one to the latch.
    let latch = Arc::clone(latch);
    std::thread::spawn(move || loop {
        if TERM_FLAG.swap(false, Ordering::Relaxed) {
            latch.notify(ExitReason::Signal(SignalKind::Terminate));
            break;
        }
        if INT_FLAG.swap(false, Ordering::Relaxed) {
            latch.notify(ExitReason::Signal(SignalKind::Interrupt));
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    });

    debug!("Signal handlers registered");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let latch = ExitLatch::new();
        latch.notify(ExitReason::Fault(UpsError::Gpio("lost chip".to_string())));
        latch.notify(ExitReason::ShutdownComplete);

        assert_eq!(
            latch.wait(),
            ExitReason::Fault(UpsError::Gpio("lost chip".to_string()))
        );
    }

    #[test]
    fn test_wait_blocks_until_notified() {
        let latch = Arc::new(ExitLatch::new());
        let notifier = Arc::clone(&latch);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            notifier.notify(ExitReason::Signal(SignalKind::Terminate));
        });

        assert_eq!(latch.wait(), ExitReason::Signal(SignalKind::Terminate));
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(
            ExitReason::ShutdownComplete.to_string(),
            "shutdown sequence complete"
        );
        assert_eq!(
            ExitReason::Signal(SignalKind::Interrupt).to_string(),
            "SIGINT received"
        );
        assert_eq!(
            ExitReason::Fault(UpsError::NoPulse("quiet".to_string())).to_string(),
            "fatal error: no pulse train: quiet"
        );
    }
}
