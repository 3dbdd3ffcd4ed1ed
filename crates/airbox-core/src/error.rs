//! Error types for airbox-core.
//!
//! Only explicit commands (listing ports, connecting, disconnecting) return
//! these errors. Faults inside the background reader never cross the task
//! boundary; they tear the session down and are reported as events.
//!
//! | Error Type | Caller sees it? | Recovery |
//! |------------|-----------------|----------|
//! | [`Error::Enumeration`] | `list_ports` | Retried on the next refresh tick |
//! | [`Error::Open`] | `connect` | None, the user picks another port |
//! | [`Error::Conflict`] | `connect` | Retry the connect |
//! | [`Error::ShuttingDown`] | `connect` | None |
//! | [`Error::Close`] | `disconnect` | Session is already torn down |

use std::io;

use thiserror::Error;

/// Errors returned by monitor commands.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Listing serial ports failed or found nothing.
    #[error("Failed to list serial ports: {0}")]
    Enumeration(EnumerationFailure),

    /// The device could not be opened.
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        /// The port that was requested.
        port: String,
        /// Underlying cause (busy, missing, permission denied, ...).
        #[source]
        source: io::Error,
    },

    /// Another session was installed while this one was being opened.
    #[error("Connection conflict on {port}: another session is already active")]
    Conflict {
        /// The port whose freshly opened handle was discarded.
        port: String,
    },

    /// The monitor is shutting down and refuses new sessions.
    #[error("Monitor is shutting down")]
    ShuttingDown,

    /// Closing the device failed. The session is torn down regardless.
    #[error("Failed to close serial port {port}: {source}")]
    Close {
        /// The port being closed.
        port: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reason why port enumeration failed.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnumerationFailure {
    /// The platform reported no serial ports.
    NoPorts,
    /// The platform call itself failed.
    Platform(String),
}

impl std::fmt::Display for EnumerationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPorts => write!(f, "no serial ports found"),
            Self::Platform(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error {
    /// Create an open error for a port.
    pub fn open(port: impl Into<String>, source: io::Error) -> Self {
        Self::Open {
            port: port.into(),
            source,
        }
    }

    /// Create a close error for a port.
    pub fn close(port: impl Into<String>, source: io::Error) -> Self {
        Self::Close {
            port: port.into(),
            source,
        }
    }

    /// Create a conflict error for a port.
    pub fn conflict(port: impl Into<String>) -> Self {
        Self::Conflict { port: port.into() }
    }

    /// Create an enumeration error from a platform message.
    pub fn enumeration(message: impl Into<String>) -> Self {
        Self::Enumeration(EnumerationFailure::Platform(message.into()))
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using airbox-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::open(
            "/dev/ttyUSB0",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyUSB0"));
        assert!(msg.contains("permission denied"));

        let err = Error::conflict("COM3");
        assert!(err.to_string().contains("COM3"));

        assert_eq!(Error::ShuttingDown.to_string(), "Monitor is shutting down");
    }

    #[test]
    fn test_enumeration_display() {
        let err = Error::Enumeration(EnumerationFailure::NoPorts);
        assert!(err.to_string().contains("no serial ports found"));

        let err = Error::enumeration("udev unavailable");
        assert!(err.to_string().contains("udev unavailable"));
    }

    #[test]
    fn test_error_source() {
        use std::error::Error as _;

        let err = Error::close("COM1", io::Error::other("device gone"));
        let source = err.source().expect("close error carries its cause");
        assert_eq!(source.to_string(), "device gone");
    }
}
