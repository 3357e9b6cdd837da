//! Shared protocol state record.
//!
//! One instance lives for the whole process. The pulse/heartbeat flow
//! is the only writer; the status reporter and shutdown coordinator
//! read snapshots. All fields sit behind a single readers-writer lock
//! so every read or write observes a consistent record.

use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

/// Result of recording one accepted clock edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseUpdate {
    /// Interval since the previous edge, `None` when this edge seeded
    /// the timestamp.
    pub interval: Option<Duration>,
    /// Liveness classification after this edge.
    pub ups_running: bool,
}

/// Running statistics over measured inter-pulse intervals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseStats {
    count: u64,
    min_ns: u64,
    max_ns: u64,
    sum_ns: u64,
}

impl PulseStats {
    fn record_ns(&mut self, ns: u64) {
        if self.count == 0 {
            self.min_ns = ns;
            self.max_ns = ns;
        } else {
            self.min_ns = self.min_ns.min(ns);
            self.max_ns = self.max_ns.max(ns);
        }
        self.count += 1;
        self.sum_ns = self.sum_ns.wrapping_add(ns);
    }

    /// Number of intervals measured (seeding edges do not count).
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Shortest measured interval.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Longest measured interval.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Mean measured interval.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.count > 0).then(|| Duration::from_nanos(self.sum_ns / self.count))
    }
}

#[derive(Debug, Default)]
struct ProtocolFields {
    /// Kernel-clock timestamp of the most recent accepted edge, in
    /// nanoseconds. Not comparable with wall-clock time.
    last_pulse_ns: Option<u64>,
    last_interval: Option<Duration>,
    last_pulse_at: Option<SystemTime>,
    last_sample_at: Option<SystemTime>,
    ups_running: bool,
    should_shutdown: bool,
    /// Bit currently driven on the shared line; meaningful only while
    /// the line holds the output role.
    output_bit: bool,
    stats: PulseStats,
}

/// Consistent copy of the protocol state for readers.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolSnapshot {
    /// Wall-clock time the last edge was observed.
    pub last_pulse_at: Option<SystemTime>,
    /// Interval between the two most recent edges.
    pub last_interval: Option<Duration>,
    /// Wall-clock time of the last shutdown-bit sample.
    pub last_sample_at: Option<SystemTime>,
    /// Whether the board is classified as running.
    pub ups_running: bool,
    /// Latched result of the most recent shutdown-bit sample.
    pub should_shutdown: bool,
    /// Heartbeat bit currently driven on the shared line.
    pub output_bit: bool,
    /// Interval statistics.
    pub stats: PulseStats,
}

/// Lock-protected protocol state shared between the daemon flows.
#[derive(Debug, Default)]
pub struct ProtocolState {
    inner: RwLock<ProtocolFields>,
}

impl ProtocolState {
    /// Create a fresh record: no pulse seen, board not classified as
    /// running, no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the very first edge. Seeds the timestamp without
    /// producing an interval or a liveness classification.
    pub fn seed_pulse(&self, timestamp_ns: u64, observed_at: SystemTime) {
        let mut fields = self.write();
        fields.last_pulse_ns = Some(timestamp_ns);
        fields.last_pulse_at = Some(observed_at);
    }

    /// Record an accepted clock edge together with the heartbeat bit
    /// chosen for it.
    ///
    /// Computes the interval against the previous timestamp with
    /// wraparound-safe unsigned subtraction and reclassifies liveness
    /// (strictly below the threshold counts as running). Acts as a
    /// seed when no previous timestamp exists.
    pub fn record_pulse(
        &self,
        timestamp_ns: u64,
        observed_at: SystemTime,
        output_bit: bool,
        liveness_threshold: Duration,
    ) -> PulseUpdate {
        let mut fields = self.write();

        let interval = fields.last_pulse_ns.map(|prev| {
            let delta_ns = timestamp_ns.wrapping_sub(prev);
            Duration::from_nanos(delta_ns)
        });
        if let Some(interval) = interval {
            fields.last_interval = Some(interval);
            fields.ups_running = interval < liveness_threshold;
            fields.stats.record_ns(interval.as_nanos() as u64);
        }

        fields.last_pulse_ns = Some(timestamp_ns);
        fields.last_pulse_at = Some(observed_at);
        fields.output_bit = output_bit;

        PulseUpdate {
            interval,
            ups_running: fields.ups_running,
        }
    }

    /// Record the result of one shutdown-bit sample. Every sample
    /// re-evaluates the flag independently.
    pub fn record_sample(&self, requests_shutdown: bool, sampled_at: SystemTime) {
        let mut fields = self.write();
        fields.should_shutdown = requests_shutdown;
        fields.last_sample_at = Some(sampled_at);
    }

    /// Take a consistent snapshot under the read lock.
    #[must_use]
    pub fn snapshot(&self) -> ProtocolSnapshot {
        let fields = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        ProtocolSnapshot {
            last_pulse_at: fields.last_pulse_at,
            last_interval: fields.last_interval,
            last_sample_at: fields.last_sample_at,
            ups_running: fields.ups_running,
            should_shutdown: fields.should_shutdown,
            output_bit: fields.output_bit,
            stats: fields.stats,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ProtocolFields> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
