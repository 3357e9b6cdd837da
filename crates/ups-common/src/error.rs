use thiserror::Error;

/// Daemon error types covering configuration, GPIO access, and protocol faults.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UpsError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// GPIO chip or line operation failed.
    #[error("gpio error: {0}")]
    Gpio(String),

    /// The shared data line could not be reopened in the required
    /// direction; its role is unknown and the protocol cannot continue.
    #[error("line role lost: {0}")]
    LineRole(String),

    /// No clock pulse was observed within the extended startup wait.
    #[error("no pulse train: {0}")]
    NoPulse(String),

    /// The external shutdown command could not be run or reported failure.
    #[error("shutdown command failed: {0}")]
    Command(String),
}

/// Convenience type alias for daemon operations.
pub type UpsResult<T> = Result<T, UpsError>;
