//! Indicator command definitions and the command encoder

use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::{
    address,
    error::{Error, Result},
};

/// Protocol command codes
///
/// Commands are a single ASCII character following the address byte.
/// Only [`Command::Read`] makes the indicator answer with a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Request the current value
    Read = b'R',

    /// Zero the indicator at the current load
    AutoZero = b'Z',

    /// Freeze the displayed value
    HoldOn = b'H',

    /// Release a frozen value
    HoldOff = b'L',
}

impl Command {
    /// Check if this is a control command (no response frame)
    pub fn is_control(self) -> bool {
        !matches!(self, Self::Read)
    }

    /// Check if the indicator answers this command with a frame
    pub fn expects_response(self) -> bool {
        matches!(self, Self::Read)
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::AutoZero => "AUTO_ZERO",
            Self::HoldOn => "HOLD_ON",
            Self::HoldOff => "HOLD_OFF",
        }
    }

    /// Hold command for the requested hold state
    pub fn hold(enable: bool) -> Self {
        if enable { Self::HoldOn } else { Self::HoldOff }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'R' => Ok(Self::Read),
            b'Z' => Ok(Self::AutoZero),
            b'H' => Ok(Self::HoldOn),
            b'L' => Ok(Self::HoldOff),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')", self.name(), *self as u8 as char)
    }
}

/// Encode a command for the indicator at `device_address`
///
/// # Wire Format
///
/// ```text
/// ┌─────────────┬─────────────┐
/// │   Address   │   Command   │
/// │   1 byte    │   1 byte    │
/// └─────────────┴─────────────┘
/// ```
///
/// Commands carry no sentinels.
///
/// # Errors
///
/// Returns [`Error::InvalidAddress`] if the address is outside `1..=255`.
///
/// # Examples
///
/// ```
/// use forcelink_core::{command, Command};
///
/// let bytes = command::encode(1, Command::Read).unwrap();
/// assert_eq!(bytes.as_ref(), b"1R");
///
/// let bytes = command::encode(12, Command::HoldOn).unwrap();
/// assert_eq!(bytes.as_ref(), b"CH");
/// ```
pub fn encode(device_address: u32, command: Command) -> Result<Bytes> {
    let id_byte = address::encode_command_address(device_address)?;
    let bytes = [id_byte, command.into()];

    debug!(
        "Built command: ID={} (0x{:02X}), CMD={} ({})",
        device_address,
        id_byte,
        command,
        hex::encode_upper(bytes)
    );

    Ok(Bytes::copy_from_slice(&bytes))
}

/// Encode a command given as a raw code byte
///
/// Fails with [`Error::UnknownCommand`] when `code` is not one of `R`, `Z`,
/// `H` or `L`.
pub fn encode_raw(device_address: u32, code: u8) -> Result<Bytes> {
    let command = Command::try_from(code)?;
    encode(device_address, command)
}
