//! Error types for the bridge.

use thiserror::Error;

/// Errors that can stop the bridge.
///
/// Peer churn and malformed input are not errors: they are absorbed by the
/// tick loop. Only setup failures and a failing serial device surface here.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// I/O error on the serial device or listening socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Ring buffer capacity is not a non-zero power of two.
    #[error("ring buffer capacity must be a non-zero power of two, got {0}")]
    InvalidCapacity(usize),

    /// Configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Protocol-level error (e.g. a malformed command payload).
    #[error("protocol error: {0}")]
    Protocol(#[from] avr_protocol::ProtocolError),

    /// Signal handler could not be installed.
    #[error("signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
