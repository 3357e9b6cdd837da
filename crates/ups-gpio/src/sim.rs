//! Scripted in-memory GPIO backend.
//!
//! [`SimChip::scripted`] pairs a chip with a [`SimController`] that
//! feeds edge events and sample levels and records every request and
//! write, so protocol tests can run without hardware or real delays.
//! [`SimChip::free_running`] instead emits an endless pulse train at a
//! fixed period, which is what the daemon's simulated mode runs on.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ups_common::{UpsError, UpsResult};

use crate::{EdgeSource, GpioChip, Level, LineHandle, PulseEdge};

/// One line request observed by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimRequest {
    /// Falling-edge subscription on `offset`.
    Events {
        /// Requested line offset.
        offset: u32,
    },
    /// Output request on `offset` driven to `initial`.
    Output {
        /// Requested line offset.
        offset: u32,
        /// Level the line was driven to on request.
        initial: Level,
    },
    /// Input request on `offset`.
    Input {
        /// Requested line offset.
        offset: u32,
    },
}

enum ScriptStep {
    Edge(u64),
    Timeout,
    WaitError(String),
}

struct FreeRun {
    period: Duration,
    next_ns: u64,
}

struct SimInner {
    script: VecDeque<ScriptStep>,
    free_run: Option<FreeRun>,
    sample_levels: VecDeque<Level>,
    default_sample: Level,
    writes: Vec<Level>,
    requests: Vec<SimRequest>,
    fail_output_requests: u32,
    fail_input_requests: u32,
    fail_reads: u32,
    fail_writes: u32,
    open_handles: u32,
}

impl SimInner {
    fn new(free_run: Option<FreeRun>) -> Self {
        Self {
            script: VecDeque::new(),
            free_run,
            sample_levels: VecDeque::new(),
            default_sample: Level::High,
            writes: Vec::new(),
            requests: Vec::new(),
            fail_output_requests: 0,
            fail_input_requests: 0,
            fail_reads: 0,
            fail_writes: 0,
            open_handles: 0,
        }
    }
}

fn lock(inner: &Mutex<SimInner>) -> MutexGuard<'_, SimInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-memory GPIO chip.
#[derive(Clone)]
pub struct SimChip {
    inner: Arc<Mutex<SimInner>>,
}

impl SimChip {
    /// A chip driven entirely by a [`SimController`] script.
    ///
    /// Waits never sleep: an exhausted script reports a timeout.
    #[must_use]
    pub fn scripted() -> (Self, SimController) {
        let inner = Arc::new(Mutex::new(SimInner::new(None)));
        (
            Self {
                inner: Arc::clone(&inner),
            },
            SimController { inner },
        )
    }

    /// A chip emitting a falling edge every `period`, with sample
    /// reads reporting [`Level::High`].
    #[must_use]
    pub fn free_running(period: Duration) -> Self {
        let free_run = FreeRun {
            period,
            next_ns: duration_ns(period),
        };
        Self {
            inner: Arc::new(Mutex::new(SimInner::new(Some(free_run)))),
        }
    }
}

fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl GpioChip for SimChip {
    type Events = SimEvents;
    type Line = SimLine;

    fn watch_falling_edges(&mut self, offset: u32, _consumer: &str) -> UpsResult<Self::Events> {
        let mut inner = lock(&self.inner);
        inner.requests.push(SimRequest::Events { offset });
        inner.open_handles += 1;
        Ok(SimEvents {
            inner: Arc::clone(&self.inner),
        })
    }

    fn request_output(
        &mut self,
        offset: u32,
        _consumer: &str,
        initial: Level,
    ) -> UpsResult<Self::Line> {
        let mut inner = lock(&self.inner);
        inner.requests.push(SimRequest::Output { offset, initial });
        if inner.fail_output_requests > 0 {
            inner.fail_output_requests -= 1;
            return Err(UpsError::Gpio(format!(
                "simulated output request failure on line {offset}"
            )));
        }
        inner.writes.push(initial);
        inner.open_handles += 1;
        Ok(SimLine {
            inner: Arc::clone(&self.inner),
        })
    }

    fn request_input(&mut self, offset: u32, _consumer: &str) -> UpsResult<Self::Line> {
        let mut inner = lock(&self.inner);
        inner.requests.push(SimRequest::Input { offset });
        if inner.fail_input_requests > 0 {
            inner.fail_input_requests -= 1;
            return Err(UpsError::Gpio(format!(
                "simulated input request failure on line {offset}"
            )));
        }
        inner.open_handles += 1;
        Ok(SimLine {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Script feeder and observation window for a [`SimChip::scripted`] chip.
pub struct SimController {
    inner: Arc<Mutex<SimInner>>,
}

impl SimController {
    /// Queue a falling edge stamped `timestamp_ns`.
    pub fn push_edge(&self, timestamp_ns: u64) {
        lock(&self.inner).script.push_back(ScriptStep::Edge(timestamp_ns));
    }

    /// Queue a wait that times out without an event.
    pub fn push_timeout(&self) {
        lock(&self.inner).script.push_back(ScriptStep::Timeout);
    }

    /// Queue a wait that fails with a chip error.
    pub fn push_wait_error(&self, message: &str) {
        lock(&self.inner)
            .script
            .push_back(ScriptStep::WaitError(message.to_string()));
    }

    /// Queue a level for the next input read.
    pub fn push_sample(&self, level: Level) {
        lock(&self.inner).sample_levels.push_back(level);
    }

    /// Level reported once queued samples run out.
    pub fn set_default_sample(&self, level: Level) {
        lock(&self.inner).default_sample = level;
    }

    /// Make the next output request fail.
    pub fn fail_next_output_request(&self) {
        lock(&self.inner).fail_output_requests += 1;
    }

    /// Make the next input request fail.
    pub fn fail_next_input_request(&self) {
        lock(&self.inner).fail_input_requests += 1;
    }

    /// Make the next input read fail.
    pub fn fail_next_read(&self) {
        lock(&self.inner).fail_reads += 1;
    }

    /// Make the next output write fail.
    pub fn fail_next_write(&self) {
        lock(&self.inner).fail_writes += 1;
    }

    /// Every level written to an output handle, oldest first,
    /// including the initial level of each output request.
    #[must_use]
    pub fn writes(&self) -> Vec<Level> {
        lock(&self.inner).writes.clone()
    }

    /// Every line request made against the chip, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<SimRequest> {
        lock(&self.inner).requests.clone()
    }

    /// Number of handles currently held open.
    #[must_use]
    pub fn open_handles(&self) -> u32 {
        lock(&self.inner).open_handles
    }
}

/// Edge stream handed out by a [`SimChip`].
pub struct SimEvents {
    inner: Arc<Mutex<SimInner>>,
}

impl EdgeSource for SimEvents {
    fn wait_edge(&mut self, timeout: Duration) -> UpsResult<Option<PulseEdge>> {
        // Decide under the lock, sleep outside it.
        let (pause, event) = {
            let mut inner = lock(&self.inner);
            if let Some(run) = inner.free_run.as_mut() {
                if run.period > timeout {
                    (timeout, None)
                } else {
                    let timestamp_ns = run.next_ns;
                    run.next_ns = run.next_ns.wrapping_add(duration_ns(run.period));
                    (run.period, Some(PulseEdge { timestamp_ns }))
                }
            } else {
                match inner.script.pop_front() {
                    Some(ScriptStep::Edge(timestamp_ns)) => {
                        return Ok(Some(PulseEdge { timestamp_ns }))
                    }
                    Some(ScriptStep::WaitError(message)) => {
                        return Err(UpsError::Gpio(message))
                    }
                    Some(ScriptStep::Timeout) | None => return Ok(None),
                }
            }
        };
        std::thread::sleep(pause);
        Ok(event)
    }
}

impl Drop for SimEvents {
    fn drop(&mut self) {
        lock(&self.inner).open_handles -= 1;
    }
}

/// Line handle handed out by a [`SimChip`].
pub struct SimLine {
    inner: Arc<Mutex<SimInner>>,
}

impl LineHandle for SimLine {
    fn set(&mut self, level: Level) -> UpsResult<()> {
        let mut inner = lock(&self.inner);
        if inner.fail_writes > 0 {
            inner.fail_writes -= 1;
            return Err(UpsError::Gpio("simulated write failure".to_string()));
        }
        inner.writes.push(level);
        Ok(())
    }

    fn get(&mut self) -> UpsResult<Level> {
        let mut inner = lock(&self.inner);
        if inner.fail_reads > 0 {
            inner.fail_reads -= 1;
            return Err(UpsError::Gpio("simulated read failure".to_string()));
        }
        let level = inner
            .sample_levels
            .pop_front()
            .unwrap_or(inner.default_sample);
        Ok(level)
    }
}

impl Drop for SimLine {
    fn drop(&mut self) {
        lock(&self.inner).open_handles -= 1;
    }
}
