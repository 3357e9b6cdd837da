//! One-shot shutdown trigger and the executor flow that consumes it.
//!
//! The trigger is a capacity-1 queue with non-blocking send: the
//! first notification wins and repeats are dropped. The executor runs
//! the external shutdown command exactly once per process lifetime;
//! there is no un-latching once it has run, even if a later sample
//! reports power restored, because the command cannot be rescinded.

use std::path::PathBuf;
use std::process::Command;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::time::Duration;

use tracing::{error, info, warn};
use ups_common::{TimingConfig, UpsError, UpsResult};

/// Sending half of the one-shot shutdown trigger.
pub struct ShutdownTrigger {
    tx: SyncSender<()>,
}

impl ShutdownTrigger {
    /// Create the trigger and the receiving half the executor parks on.
    #[must_use]
    pub fn pair() -> (Self, Receiver<()>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        (Self { tx }, rx)
    }

    /// Notify the executor without blocking.
    ///
    /// Returns false when a notification is already pending or the
    /// executor is gone; either way a shutdown sequence is in flight.
    pub fn fire(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Host system actions the executor needs.
pub trait SystemControl: Send {
    /// Schedule a system halt `delay_minutes` from now.
    fn schedule_shutdown(&mut self, delay_minutes: u64) -> UpsResult<()>;
}

/// Real system control through the configured shutdown command.
pub struct SystemShutdown {
    command: PathBuf,
}

impl SystemShutdown {
    /// Use `command` (normally `/sbin/shutdown`) for the halt.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl SystemControl for SystemShutdown {
    fn schedule_shutdown(&mut self, delay_minutes: u64) -> UpsResult<()> {
        let status = Command::new(&self.command)
            .arg("-h")
            .arg(delay_minutes.to_string())
            .status()
            .map_err(|e| {
                UpsError::Command(format!("spawning {}: {e}", self.command.display()))
            })?;
        if !status.success() {
            return Err(UpsError::Command(format!(
                "{} exited with {status}",
                self.command.display()
            )));
        }
        Ok(())
    }
}

/// Parked flow that performs the single shutdown sequence.
pub struct ShutdownExecutor<S: SystemControl> {
    trigger: Receiver<()>,
    system: S,
    delay_minutes: u64,
    grace: Duration,
}

impl<S: SystemControl> ShutdownExecutor<S> {
    /// Park `system` behind `trigger` with the configured timing.
    pub fn new(trigger: Receiver<()>, system: S, timing: &TimingConfig) -> Self {
        Self {
            trigger,
            system,
            delay_minutes: timing.shutdown_delay_minutes,
            grace: timing.shutdown_grace,
        }
    }

    /// Park until triggered, schedule the halt, wait out the grace
    /// period so the heartbeat keeps running while the halt lands.
    ///
    /// A command failure is logged, never retried: the init system
    /// owns shutdown retry semantics. Returns true when a shutdown
    /// sequence ran and false when the trigger side went away without
    /// ever firing.
    pub fn run(mut self) -> bool {
        if self.trigger.recv().is_err() {
            return false;
        }
        warn!(
            delay_minutes = self.delay_minutes,
            "UPS requested shutdown, scheduling system halt"
        );
        if let Err(e) = self.system.schedule_shutdown(self.delay_minutes) {
            error!(error = %e, "Shutdown command failed");
        }
        info!(
            grace = %humantime::format_duration(self.grace),
            "Holding the heartbeat until exit"
        );
        std::thread::sleep(self.grace);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSystem {
        calls: Arc<Mutex<Vec<u64>>>,
        fail: bool,
    }

    impl SystemControl for RecordingSystem {
        fn schedule_shutdown(&mut self, delay_minutes: u64) -> UpsResult<()> {
            self.calls.lock().unwrap().push(delay_minutes);
            if self.fail {
                return Err(UpsError::Command("exit status: 1".to_string()));
            }
            Ok(())
        }
    }

    fn short_timing() -> TimingConfig {
        TimingConfig {
            shutdown_grace: Duration::from_millis(1),
            ..TimingConfig::default()
        }
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (trigger, rx) = ShutdownTrigger::pair();
        assert!(trigger.fire());
        assert!(!trigger.fire());
        assert!(!trigger.fire());

        // Exactly one notification is pending.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fire_after_executor_gone() {
        let (trigger, rx) = ShutdownTrigger::pair();
        drop(rx);
        assert!(!trigger.fire());
    }

    #[test]
    fn test_executor_runs_command_once() {
        let (trigger, rx) = ShutdownTrigger::pair();
        let system = RecordingSystem::default();
        let calls = Arc::clone(&system.calls);
        let executor = ShutdownExecutor::new(rx, system, &short_timing());

        trigger.fire();
        assert!(executor.run());
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_executor_survives_command_failure() {
        let (trigger, rx) = ShutdownTrigger::pair();
        let system = RecordingSystem {
            fail: true,
            ..RecordingSystem::default()
        };
        let calls = Arc::clone(&system.calls);
        let executor = ShutdownExecutor::new(rx, system, &short_timing());

        trigger.fire();
        assert!(executor.run());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_executor_stands_down_without_trigger() {
        let (trigger, rx) = ShutdownTrigger::pair();
        let system = RecordingSystem::default();
        let calls = Arc::clone(&system.calls);
        let executor = ShutdownExecutor::new(rx, system, &short_timing());

        drop(trigger);
        assert!(!executor.run());
        assert!(calls.lock().unwrap().is_empty());
    }
}
