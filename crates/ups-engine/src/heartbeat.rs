//! Shared data line: heartbeat driving and shutdown-bit sampling.
//!
//! The line carries two meanings over one physical pin. Most of the
//! time it is an output driving the heartbeat bit; on a timer it is
//! closed, reopened as an input, read exactly once, and reopened as
//! an output re-asserting the last bit. [`SampleGate`] guards that
//! switch so it only happens in the bit's low phase and at most once
//! per sampling interval.

use std::mem;
use std::time::{Duration, Instant};

use tracing::warn;
use ups_common::{UpsError, UpsResult};
use ups_gpio::{GpioChip, Level, LineHandle};

/// Consumer label held on the data line while driving the heartbeat.
pub const DRIVE_CONSUMER: &str = "upspicod-pulse-write";
/// Consumer label held on the data line while sampling.
pub const SAMPLE_CONSUMER: &str = "upspicod-pulse-read";

enum Role<L> {
    Driving(L),
    Sampling(L),
    /// A role switch failed; no direction is held and the line is
    /// unusable for the rest of the process lifetime.
    Failed,
}

/// Exclusive owner of the shared data line.
///
/// All opens, closes, reads, and writes on the line go through this
/// one value, so direction changes cannot race.
pub struct DataLine<C: GpioChip> {
    chip: C,
    offset: u32,
    bit: Level,
    role: Role<C::Line>,
}

impl<C: GpioChip> DataLine<C> {
    /// Claim `offset` as an output driven low.
    pub fn open(mut chip: C, offset: u32) -> UpsResult<Self> {
        let line = chip.request_output(offset, DRIVE_CONSUMER, Level::Low)?;
        Ok(Self {
            chip,
            offset,
            bit: Level::Low,
            role: Role::Driving(line),
        })
    }

    /// Heartbeat bit currently asserted.
    #[must_use]
    pub fn bit(&self) -> Level {
        self.bit
    }

    /// True once a role switch has failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.role, Role::Failed)
    }

    /// Flip the heartbeat bit and drive it onto the line.
    ///
    /// A failed write is not fatal: the bit stays flipped and the
    /// next edge drives the line again.
    pub fn toggle(&mut self) -> Level {
        self.bit = self.bit.flipped();
        if let Role::Driving(line) = &mut self.role {
            if let Err(e) = line.set(self.bit) {
                warn!(error = %e, offset = self.offset, "Failed to drive heartbeat bit");
            }
        }
        self.bit
    }

    /// Read the shutdown-request bit, switching the line to input and
    /// back to output.
    ///
    /// A failed read reports `Ok(None)` and the line is still
    /// restored. Failing to reopen the line in either direction is
    /// fatal: the role is unknown and the protocol cannot continue.
    pub fn sample(&mut self) -> UpsResult<Option<Level>> {
        self.enter_sampling()?;
        let read = match &mut self.role {
            Role::Sampling(line) => match line.get() {
                Ok(level) => Some(level),
                Err(e) => {
                    warn!(error = %e, offset = self.offset, "Failed to read shutdown bit");
                    None
                }
            },
            Role::Driving(_) | Role::Failed => None,
        };
        self.enter_driving()?;
        Ok(read)
    }

    fn enter_sampling(&mut self) -> UpsResult<()> {
        self.release();
        let line = self
            .chip
            .request_input(self.offset, SAMPLE_CONSUMER)
            .map_err(|e| {
                UpsError::LineRole(format!("reopening line {} as input: {e}", self.offset))
            })?;
        self.role = Role::Sampling(line);
        Ok(())
    }

    fn enter_driving(&mut self) -> UpsResult<()> {
        self.release();
        let line = self
            .chip
            .request_output(self.offset, DRIVE_CONSUMER, self.bit)
            .map_err(|e| {
                UpsError::LineRole(format!("reopening line {} as output: {e}", self.offset))
            })?;
        self.role = Role::Driving(line);
        Ok(())
    }

    /// Drop whatever handle is held. The role stays `Failed` until a
    /// reopen succeeds.
    fn release(&mut self) {
        match mem::replace(&mut self.role, Role::Failed) {
            Role::Driving(line) | Role::Sampling(line) => drop(line),
            Role::Failed => {}
        }
    }
}

/// Cadence and phase guard for entering the sampling role.
///
/// Sampling is only allowed while the heartbeat bit sits in its low
/// phase, and at most once per interval. The interval is anchored at
/// the sampling attempt, so a failed read still holds the cadence.
#[derive(Debug)]
pub struct SampleGate {
    interval: Duration,
    last_attempt: Option<Instant>,
}

impl SampleGate {
    /// A gate that lets the first low-phase attempt through
    /// immediately.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: None,
        }
    }

    /// Whether a sampling attempt is due.
    #[must_use]
    pub fn ready(&self, bit: Level, now: Instant) -> bool {
        bit.is_low()
            && self
                .last_attempt
                .map_or(true, |at| now.duration_since(at) >= self.interval)
    }

    /// Anchor the cadence at a sampling attempt.
    pub fn mark(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }
}
