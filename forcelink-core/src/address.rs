//! Device address (indicator ID) codec
//!
//! Commands and responses do not encode the address the same way:
//!
//! ```text
//! address   command byte            response byte
//! 1..=9     '1'..='9'               '1'..='9'
//! 10..=15   'A'..='F'               ':'..='?'  (0x30 + address)
//! 16..=255  0x30 + address,         decoded as ascii - 0x30
//!           0x30 + address % 48
//!           above 0x7F
//! ```
//!
//! The command-side mapping for 16..=255 has not been verified against
//! hardware and is kept exactly as the indicator vendor's examples imply.

use tracing::warn;

use crate::{
    constants::{MAX_DEVICE_ADDRESS, MIN_DEVICE_ADDRESS},
    error::{Error, Result},
};

/// Highest byte value still inside printable ASCII
const ASCII_LIMIT: u32 = 0x7F;

/// Offset of the ASCII digit '0'
const ASCII_ZERO: u32 = 0x30;

/// Validate a caller-supplied device address
///
/// # Examples
///
/// ```
/// use forcelink_core::address;
///
/// assert_eq!(address::validate(1).unwrap(), 1);
/// assert!(address::validate(0).is_err());
/// assert!(address::validate(256).is_err());
/// ```
pub fn validate(device_address: u32) -> Result<u8> {
    if !(MIN_DEVICE_ADDRESS..=MAX_DEVICE_ADDRESS).contains(&device_address) {
        return Err(Error::InvalidAddress(device_address));
    }
    Ok(device_address as u8)
}

/// Encode the address byte sent in front of a command
pub fn encode_command_address(device_address: u32) -> Result<u8> {
    let address = validate(device_address)? as u32;

    let id_byte = match address {
        1..=9 => ASCII_ZERO + address,
        10..=15 => b'A' as u32 + (address - 10),
        _ => {
            let byte = ASCII_ZERO + address;
            if byte > ASCII_LIMIT {
                ASCII_ZERO + (address % 48)
            } else {
                byte
            }
        }
    };

    Ok(id_byte as u8)
}

/// Address byte an indicator puts into its response frames
///
/// Returns `None` when the byte would fall outside ASCII, which a frame
/// cannot carry.
pub fn response_address_byte(device_address: u8) -> Option<u8> {
    let byte = ASCII_ZERO + device_address as u32;
    (byte <= ASCII_LIMIT).then_some(byte as u8)
}

/// Decode the address text found in front of the sign of a response
///
/// A single character follows the response-side mapping; longer prefixes are
/// parsed as a decimal integer.
pub fn decode_response_address(id_text: &str) -> Result<u16> {
    let mut chars = id_text.chars();

    match (chars.next(), chars.next()) {
        (None, _) => Err(Error::EmptyAddress(id_text.to_string())),
        (Some(c), None) => Ok(decode_single(c)),
        _ => id_text.parse::<u16>().map_err(|e| {
            warn!("Failed to parse indicator ID '{}': {}", id_text, e);
            Error::InvalidAddressText(id_text.to_string())
        }),
    }
}

fn decode_single(c: char) -> u16 {
    match c {
        '0'..='9' => c as u16 - ASCII_ZERO as u16,
        ':' => 10,
        '?' => 15,
        _ => {
            let ascii = c as u16;
            ascii.checked_sub(ASCII_ZERO as u16).unwrap_or(ascii)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate_boundaries() {
        assert_eq!(validate(1), Ok(1));
        assert_eq!(validate(255), Ok(255));
        assert_eq!(validate(0), Err(Error::InvalidAddress(0)));
        assert_eq!(validate(256), Err(Error::InvalidAddress(256)));
    }

    #[test]
    fn test_command_address_digits() {
        assert_eq!(encode_command_address(1).unwrap(), b'1');
        assert_eq!(encode_command_address(9).unwrap(), b'9');
    }

    #[test]
    fn test_command_address_hex() {
        assert_eq!(encode_command_address(10).unwrap(), b'A');
        assert_eq!(encode_command_address(11).unwrap(), b'B');
        assert_eq!(encode_command_address(15).unwrap(), b'F');
    }

    #[test]
    fn test_command_address_high_range() {
        // 0x30 + 16 stays inside ASCII
        assert_eq!(encode_command_address(16).unwrap(), 0x40);
        assert_eq!(encode_command_address(79).unwrap(), 0x7F);
        // 0x30 + 80 = 0x80 wraps to 0x30 + (80 % 48)
        assert_eq!(encode_command_address(80).unwrap(), 0x30 + 32);
        assert_eq!(encode_command_address(255).unwrap(), 0x30 + (255 % 48) as u8);
    }

    #[test]
    fn test_command_address_rejects_zero() {
        assert!(encode_command_address(0).is_err());
    }

    #[test]
    fn test_response_address_byte() {
        assert_eq!(response_address_byte(1), Some(b'1'));
        assert_eq!(response_address_byte(10), Some(b':'));
        assert_eq!(response_address_byte(15), Some(b'?'));
        assert_eq!(response_address_byte(79), Some(0x7F));
        assert_eq!(response_address_byte(80), None);
    }

    #[test]
    fn test_decode_single_character() {
        assert_eq!(decode_response_address("1"), Ok(1));
        assert_eq!(decode_response_address("9"), Ok(9));
        assert_eq!(decode_response_address("0"), Ok(0));
        assert_eq!(decode_response_address(":"), Ok(10));
        assert_eq!(decode_response_address("?"), Ok(15));
        assert_eq!(decode_response_address(";"), Ok(11));
        // Hex letters are not part of the response mapping
        assert_eq!(decode_response_address("A"), Ok(17));
        // Below '0' the raw ASCII value is used
        assert_eq!(decode_response_address("!"), Ok(0x21));
    }

    #[test]
    fn test_decode_multi_character() {
        assert_eq!(decode_response_address("12"), Ok(12));
        assert_eq!(decode_response_address("255"), Ok(255));
        assert_eq!(
            decode_response_address("1x"),
            Err(Error::InvalidAddressText("1x".into()))
        );
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(
            decode_response_address(""),
            Err(Error::EmptyAddress(String::new()))
        );
    }

    #[test]
    fn test_response_mapping_round_trip() {
        for address in 1u8..=15 {
            let byte = response_address_byte(address).unwrap();
            let text = (byte as char).to_string();
            assert_eq!(decode_response_address(&text), Ok(address as u16));
        }
    }
}
