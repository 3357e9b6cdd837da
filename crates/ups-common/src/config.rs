//! Configuration structures for the UPS Pico daemon.
//!
//! Supports TOML deserialization with defaults matching the board's
//! stock wiring, so running without a config file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{UpsError, UpsResult};

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// GPIO character device carrying both protocol lines.
    pub gpiochip: PathBuf,

    /// Line offset of the clock/pulse input from the board.
    pub clock_pin: u32,

    /// Line offset of the shared bidirectional data line.
    pub pulse_pin: u32,

    /// External command invoked to schedule the system halt.
    pub shutdown_command: PathBuf,

    /// Protocol timing parameters.
    pub timing: TimingConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            gpiochip: PathBuf::from("/dev/gpiochip0"),
            clock_pin: 27,
            pulse_pin: 22,
            shutdown_command: PathBuf::from("/sbin/shutdown"),
            timing: TimingConfig::default(),
        }
    }
}

/// Protocol timing parameters.
///
/// The board pulses every 400-500 ms under normal operation; the
/// defaults below encode the defensive variant of the protocol. They
/// are configuration, not protocol law - boards with different
/// firmware may need different values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Inter-pulse intervals below this classify the board as running.
    /// The comparison is strict: an interval equal to the threshold
    /// counts as not running.
    #[serde(with = "humantime_serde")]
    pub liveness_threshold: Duration,

    /// Minimum time between two samples of the shutdown-request bit.
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,

    /// Steady-state bounded wait for the next clock edge.
    #[serde(with = "humantime_serde")]
    pub edge_wait: Duration,

    /// Initial wait for the very first clock edge.
    #[serde(with = "humantime_serde")]
    pub first_pulse_wait: Duration,

    /// Extended retry wait when the first edge does not arrive,
    /// tolerating board cold-start.
    #[serde(with = "humantime_serde")]
    pub first_pulse_retry_wait: Duration,

    /// Cadence of the periodic status report.
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,

    /// Pause between issuing the shutdown command and exiting, during
    /// which the heartbeat keeps running.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,

    /// Delay argument passed to the shutdown command, in minutes.
    pub shutdown_delay_minutes: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            liveness_threshold: Duration::from_secs(1),
            sample_interval: Duration::from_secs(10),
            edge_wait: Duration::from_secs(60),
            first_pulse_wait: Duration::from_secs(60),
            first_pulse_retry_wait: Duration::from_secs(600),
            status_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(60),
            shutdown_delay_minutes: 1,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field consistency the types cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`UpsError::Config`] when both protocol pins share a
    /// line offset or a protocol threshold is zero.
    pub fn validate(&self) -> UpsResult<()> {
        if self.clock_pin == self.pulse_pin {
            return Err(UpsError::Config(format!(
                "clock_pin and pulse_pin both use line offset {}",
                self.clock_pin
            )));
        }
        if self.timing.liveness_threshold.is_zero() {
            return Err(UpsError::Config(
                "liveness_threshold must be non-zero".to_string(),
            ));
        }
        if self.timing.sample_interval.is_zero() {
            return Err(UpsError::Config(
                "sample_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
