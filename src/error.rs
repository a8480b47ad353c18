//! # Error Types
//!
//! Custom error types for OBD CLI using `thiserror`.

use thiserror::Error;

/// Main error type for OBD CLI
#[derive(Debug, Error)]
pub enum ObdError {
    /// Malformed `PID:INTERVAL` monitor token
    #[error("PID value \"{0}\" is not valid. Format must be PID:INTERVAL, e.g 0C:500 to get RPM every 500 milliseconds")]
    InvalidMonitorSpec(String),

    /// Pid code or name that is not in the catalog
    #[error("unknown pid \"{0}\", run the \"list\" command to see supported pids")]
    UnknownPid(String),

    /// Transport connection failures
    #[error("connection error: {0}")]
    Connection(String),

    /// Serial port errors
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// Telemetry record serialization errors
    #[error("failed to serialize telemetry record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OBD CLI
pub type Result<T> = std::result::Result<T, ObdError>;
