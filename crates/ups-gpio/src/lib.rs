//! GPIO access layer for the UPS Pico daemon.
//!
//! This crate provides:
//! - [`GpioChip`], [`EdgeSource`], and [`LineHandle`] traits the protocol
//!   engine is written against
//! - [`cdev`] module with the Linux character-device backend
//! - [`sim`] module with a scripted in-memory backend for tests and
//!   hardware-free development
//!
//! A handle is released by dropping it; re-requesting the same offset
//! in a different direction is how the engine switches the shared data
//! line between its output and input roles.

pub mod cdev;
pub mod sim;

pub use cdev::CdevChip;
pub use sim::{SimChip, SimController, SimRequest};

use ups_common::UpsResult;

/// Logic level on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Line inactive / driven low.
    Low,
    /// Line active / driven high.
    High,
}

impl Level {
    /// The opposite level.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }

    /// True for [`Level::Low`].
    #[must_use]
    pub fn is_low(self) -> bool {
        self == Level::Low
    }

    /// True for [`Level::High`].
    #[must_use]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// A falling-edge event on the clock line.
///
/// The timestamp is taken by the kernel on the monotonic clock domain,
/// so consecutive events can be subtracted without wall-clock skew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEdge {
    /// Event time in nanoseconds on the kernel clock.
    pub timestamp_ns: u64,
}

/// Source of falling-edge events on one requested line.
pub trait EdgeSource: Send {
    /// Wait up to `timeout` for the next falling edge.
    ///
    /// Returns `Ok(None)` when the wait timed out without an event.
    fn wait_edge(&mut self, timeout: std::time::Duration) -> UpsResult<Option<PulseEdge>>;
}

/// An open, directional line handle. Dropping it releases the line.
pub trait LineHandle: Send {
    /// Drive the line to `level`. Only meaningful on output handles.
    fn set(&mut self, level: Level) -> UpsResult<()>;

    /// Read the current level. Only meaningful on input handles.
    fn get(&mut self) -> UpsResult<Level>;
}

/// A GPIO chip that can hand out event sources and line handles.
///
/// The engine requests each line at most once at a time; the chip does
/// not need to arbitrate concurrent claims on the same offset.
pub trait GpioChip: Send {
    /// Edge-event source type produced by this chip.
    type Events: EdgeSource;
    /// Line handle type produced by this chip.
    type Line: LineHandle;

    /// Request `offset` as an input delivering falling-edge events.
    fn watch_falling_edges(&mut self, offset: u32, consumer: &str) -> UpsResult<Self::Events>;

    /// Request `offset` as an output driven to `initial`.
    fn request_output(
        &mut self,
        offset: u32,
        consumer: &str,
        initial: Level,
    ) -> UpsResult<Self::Line>;

    /// Request `offset` as a plain input for level reads.
    fn request_input(&mut self, offset: u32, consumer: &str) -> UpsResult<Self::Line>;
}
