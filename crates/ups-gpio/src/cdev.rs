//! Linux GPIO character-device backend.
//!
//! Each request opens the chip device fresh, so dropping a handle and
//! requesting the same offset again is a complete release/reclaim of
//! the line, matching how the kernel uAPI scopes line ownership.

use std::path::PathBuf;
use std::time::Duration;

use gpiocdev::line::{EdgeDetection, Value};
use gpiocdev::request::Request;
use tracing::debug;
use ups_common::{UpsError, UpsResult};

use crate::{EdgeSource, GpioChip, Level, LineHandle, PulseEdge};

fn to_value(level: Level) -> Value {
    match level {
        Level::Low => Value::Inactive,
        Level::High => Value::Active,
    }
}

fn from_value(value: Value) -> Level {
    match value {
        Value::Inactive => Level::Low,
        Value::Active => Level::High,
    }
}

/// A GPIO chip addressed by its character-device path.
#[derive(Debug, Clone)]
pub struct CdevChip {
    path: PathBuf,
}

impl CdevChip {
    /// Create a chip backed by the device at `path`, e.g. `/dev/gpiochip0`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The device path this chip talks to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl GpioChip for CdevChip {
    type Events = CdevEvents;
    type Line = CdevLine;

    fn watch_falling_edges(&mut self, offset: u32, consumer: &str) -> UpsResult<Self::Events> {
        debug!(chip = %self.path.display(), offset, consumer, "Requesting falling-edge events");
        let req = Request::builder()
            .on_chip(&self.path)
            .with_consumer(consumer)
            .with_line(offset)
            .with_edge_detection(EdgeDetection::FallingEdge)
            .request()
            .map_err(|e| {
                UpsError::Gpio(format!(
                    "requesting edge events on {}:{offset}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(CdevEvents { req })
    }

    fn request_output(
        &mut self,
        offset: u32,
        consumer: &str,
        initial: Level,
    ) -> UpsResult<Self::Line> {
        debug!(chip = %self.path.display(), offset, consumer, ?initial, "Requesting output line");
        let req = Request::builder()
            .on_chip(&self.path)
            .with_consumer(consumer)
            .with_line(offset)
            .as_output(to_value(initial))
            .request()
            .map_err(|e| {
                UpsError::Gpio(format!(
                    "requesting output on {}:{offset}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(CdevLine { req, offset })
    }

    fn request_input(&mut self, offset: u32, consumer: &str) -> UpsResult<Self::Line> {
        debug!(chip = %self.path.display(), offset, consumer, "Requesting input line");
        let req = Request::builder()
            .on_chip(&self.path)
            .with_consumer(consumer)
            .with_line(offset)
            .as_input()
            .request()
            .map_err(|e| {
                UpsError::Gpio(format!(
                    "requesting input on {}:{offset}: {e}",
                    self.path.display()
                ))
            })?;
        Ok(CdevLine { req, offset })
    }
}

/// Falling-edge event stream over a kernel line request.
#[derive(Debug)]
pub struct CdevEvents {
    req: Request,
}

impl EdgeSource for CdevEvents {
    fn wait_edge(&mut self, timeout: Duration) -> UpsResult<Option<PulseEdge>> {
        let ready = self
            .req
            .wait_edge_event(timeout)
            .map_err(|e| UpsError::Gpio(format!("waiting for edge event: {e}")))?;
        if !ready {
            return Ok(None);
        }
        let event = self
            .req
            .read_edge_event()
            .map_err(|e| UpsError::Gpio(format!("reading edge event: {e}")))?;
        Ok(Some(PulseEdge {
            timestamp_ns: event.timestamp_ns,
        }))
    }
}

/// A single requested line in one direction.
#[derive(Debug)]
pub struct CdevLine {
    req: Request,
    offset: u32,
}

impl LineHandle for CdevLine {
    fn set(&mut self, level: Level) -> UpsResult<()> {
        self.req
            .set_value(self.offset, to_value(level))
            .map_err(|e| UpsError::Gpio(format!("setting line {}: {e}", self.offset)))?;
        Ok(())
    }

    fn get(&mut self) -> UpsResult<Level> {
        let value = self
            .req
            .value(self.offset)
            .map_err(|e| UpsError::Gpio(format!("reading line {}: {e}", self.offset)))?;
        Ok(from_value(value))
    }
}

// Anything touching a real line request needs hardware; only the
// device-path plumbing is testable here.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_keeps_device_path() {
        let chip = CdevChip::new("/dev/gpiochip4");
        assert_eq!(chip.path(), std::path::Path::new("/dev/gpiochip4"));
    }
}
