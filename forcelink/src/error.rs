//! High-level error types
//!
//! Every failure a caller sees falls into one of four kinds, each carrying
//! the device or port context it happened in.

use std::fmt;

use bytes::Bytes;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation attempted while disconnected, or the port failed to open
    #[error("Connection error on {port}: {reason}")]
    Connection { port: String, reason: String },

    /// No valid matching response arrived, or the response was unusable
    #[error("Communication error with device {address}: {message}")]
    Communication {
        address: u16,
        message: String,
        raw: Option<Bytes>,
    },

    /// Unexpected failure in the middle of an operation
    #[error("{operation} failed on device {address}: {source}")]
    Operation {
        operation: &'static str,
        address: u16,
        #[source]
        source: BoxError,
    },

    /// Illegal caller input, rejected before any I/O
    #[error("Invalid {parameter}: {message}")]
    Validation { parameter: &'static str, message: String },
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Communication,
    Operation,
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Communication => "communication",
            Self::Operation => "operation",
            Self::Validation => "validation",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn connection(port: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Connection {
            port: port.into(),
            reason: reason.to_string(),
        }
    }

    pub fn communication(address: u16, message: impl Into<String>) -> Self {
        Self::Communication {
            address,
            message: message.into(),
            raw: None,
        }
    }

    pub fn operation(
        operation: &'static str,
        address: u16,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Operation {
            operation,
            address,
            source: source.into(),
        }
    }

    pub fn validation(parameter: &'static str, message: impl fmt::Display) -> Self {
        Self::Validation {
            parameter,
            message: message.to_string(),
        }
    }

    /// Attach the raw bytes that caused a communication error
    pub fn with_raw(self, bytes: Bytes) -> Self {
        match self {
            Self::Communication { address, message, .. } => Self::Communication {
                address,
                message,
                raw: Some(bytes),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Communication { .. } => ErrorKind::Communication,
            Self::Operation { .. } => ErrorKind::Operation,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Only communication errors qualify: the indicator may simply have
    /// missed a command or answered late.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Communication
    }
}

impl From<forcelink_types::Error> for Error {
    fn from(err: forcelink_types::Error) -> Self {
        Self::validation("setting", err)
    }
}
