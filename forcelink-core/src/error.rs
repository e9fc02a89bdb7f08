//! Error types for forcelink-core

/// Result type alias for forcelink-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
///
/// Everything from [`Error::FrameTooShort`] downwards describes why a frame
/// could not be decoded. Those never leave [`crate::response::decode`], which
/// logs the reason and reports "no frame" instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Device address outside the protocol range
    #[error("Invalid device address: {0} (must be between 1 and 255)")]
    InvalidAddress(u32),

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// First byte is not STX
    #[error("Invalid STX: 0x{0:02X}")]
    MissingStx(u8),

    /// Last byte is not ETX
    #[error("Invalid ETX: 0x{0:02X}")]
    MissingEtx(u8),

    /// Payload contains non-ASCII bytes
    #[error("Payload is not ASCII: {0}")]
    NonAscii(String),

    /// No '+' or '-' in the payload
    #[error("No sign found in payload '{0}'")]
    MissingSign(String),

    /// Nothing in front of the sign
    #[error("Empty device address in payload '{0}'")]
    EmptyAddress(String),

    /// Multi-character address that is not a decimal integer
    #[error("Invalid device address text '{0}'")]
    InvalidAddressText(String),

    /// Value text contains no digit segments
    #[error("No numeric parts found in '{0}'")]
    NoDigits(String),

    /// More than one segment carries a decimal point
    #[error("Multiple decimal points in '{0}'")]
    MultipleDecimalPoints(String),

    /// Reconstructed digit string does not parse
    #[error("Failed to parse numeric value '{0}'")]
    InvalidNumber(String),

    /// Value outside the indicator's display range
    #[error("Value out of range: {value} (allowed: {min} to {max})")]
    ValueOutOfRange {
        value: f64,
        min: f64,
        max: f64,
    },
}

impl Error {
    /// Check if the error describes a malformed or rejected frame
    pub fn is_decode_error(&self) -> bool {
        !matches!(self, Self::InvalidAddress(_) | Self::UnknownCommand(_))
    }

    /// Check if the error is a caller-side validation failure
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidAddress(_) | Self::UnknownCommand(_))
    }
}
