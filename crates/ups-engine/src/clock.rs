//! Injectable time sources.
//!
//! Cadence decisions (the sampling gate, liveness reporting) run on
//! the monotonic reading; wall-clock readings only stamp
//! observability fields and are never subtracted from each other.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// Time source the protocol engine schedules against.
pub trait Clock: Send + Sync {
    /// Monotonic reading.
    fn now(&self) -> Instant;

    /// Wall-clock reading.
    fn wall(&self) -> SystemTime;
}

/// The real process clocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Hand-advanced clock for tests.
///
/// Clones share one offset, so the handle kept by a test moves the
/// copy held inside the engine. The wall reading starts at the Unix
/// epoch to keep test output deterministic.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    wall_base: SystemTime,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// A clock frozen at its creation point.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            wall_base: SystemTime::UNIX_EPOCH,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Move both readings forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += step;
    }

    fn offset(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset()
    }

    fn wall(&self) -> SystemTime {
        self.wall_base + self.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_stands_still() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.wall(), SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn test_advance_moves_both_readings() {
        let clock = ManualClock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now().duration_since(before), Duration::from_secs(10));
        assert_eq!(
            clock.wall(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(10)
        );
    }

    #[test]
    fn test_clones_share_the_offset() {
        let clock = ManualClock::new();
        let engine_copy = clock.clone();
        clock.advance(Duration::from_millis(450));
        assert_eq!(engine_copy.now(), clock.now());
    }
}
