//! Response decoding
//!
//! Indicators pad the value field with spaces or underscores instead of
//! zeros (`"_ _7487"`, `"_748.6"`), so the value text is reassembled from
//! its digit segments before it is parsed.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::{
    address,
    constants::{
        ETX, MAX_VALUE, MIN_FRAME_LEN, MIN_VALUE, STX,
        sign::{MINUS, PLUS},
    },
    error::{Error, Result},
};

/// One decoded measurement frame
///
/// Only [`Response::parse`] and [`decode`] produce responses from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    device_address: u16,
    sign: char,
    value: f64,
    raw_text: String,
    is_valid: bool,
}

impl Response {
    /// Create a response; it is valid only for a `+` or `-` sign
    pub fn new(device_address: u16, sign: char, value: f64, raw_text: impl Into<String>) -> Self {
        Self {
            device_address,
            sign,
            value,
            raw_text: raw_text.into(),
            is_valid: matches!(sign, PLUS | MINUS),
        }
    }

    /// Parse a complete frame, keeping the reason on failure
    ///
    /// # Errors
    ///
    /// Returns a decode error if the frame is shorter than 5 bytes, lacks its
    /// sentinels, is not ASCII, has no sign or address, or carries a value
    /// that cannot be reconstructed or lies outside the display range.
    ///
    /// # Examples
    ///
    /// ```
    /// use forcelink_core::Response;
    ///
    /// let response = Response::parse(b"\x022-_74.86\x03").unwrap();
    /// assert_eq!(response.device_address(), 2);
    /// assert_eq!(response.value(), -74.86);
    /// ```
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < MIN_FRAME_LEN {
            return Err(Error::FrameTooShort {
                expected: MIN_FRAME_LEN,
                actual: frame.len(),
            });
        }

        if frame[0] != STX {
            return Err(Error::MissingStx(frame[0]));
        }

        let last = frame[frame.len() - 1];
        if last != ETX {
            return Err(Error::MissingEtx(last));
        }

        let payload = &frame[1..frame.len() - 1];
        if !payload.is_ascii() {
            return Err(Error::NonAscii(hex::encode_upper(payload)));
        }
        let text = String::from_utf8_lossy(payload).into_owned();

        trace!("Parsing ASCII data: '{}'", text);

        let sign_pos = text
            .find([PLUS, MINUS])
            .ok_or_else(|| Error::MissingSign(text.clone()))?;

        let device_address = address::decode_response_address(&text[..sign_pos])?;
        let sign = text[sign_pos..].chars().next().unwrap_or(PLUS);

        let magnitude = parse_numeric_value(&text[sign_pos + 1..])?;
        let value = if sign == MINUS { -magnitude } else { magnitude };

        if !(MIN_VALUE..=MAX_VALUE).contains(&value) {
            return Err(Error::ValueOutOfRange {
                value,
                min: MIN_VALUE,
                max: MAX_VALUE,
            });
        }

        let response = Self::new(device_address, sign, value, text);
        debug!(
            "Parsed response: ID={}, Value={}, Sign={}",
            response.device_address, response.value, response.sign
        );

        Ok(response)
    }

    /// Device address the frame came from
    pub fn device_address(&self) -> u16 {
        self.device_address
    }

    /// Sign character of the frame
    pub fn sign(&self) -> char {
        self.sign
    }

    /// Signed measurement value
    pub fn value(&self) -> f64 {
        self.value
    }

    /// ASCII payload between the sentinels
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response[{}](value={}, raw='{}')",
            self.device_address, self.value, self.raw_text
        )
    }
}

/// Decode one extracted frame
///
/// Malformed frames are expected on a live line; they are logged and
/// reported as `None`.
pub fn decode(frame: &[u8]) -> Option<Response> {
    match Response::parse(frame) {
        Ok(response) => Some(response),
        Err(e) => {
            debug!("Discarding frame {}: {}", hex::encode_upper(frame), e);
            None
        }
    }
}

/// Reconstruct the unsigned value from its padded text
///
/// ```text
/// "_7.487"   -> ["7.487"]          -> 7.487
/// "_ _7487"  -> ["7487"]           -> 7487
/// "7 48.6"   -> ["7", "48.6"]      -> 748.6
/// "1 2 3"    -> ["1", "2", "3"]    -> 123
/// ```
pub fn parse_numeric_value(value_text: &str) -> Result<f64> {
    let digits = reconstruct_digits(value_text)?;

    digits
        .parse::<f64>()
        .map_err(|_| Error::InvalidNumber(digits))
}

fn reconstruct_digits(value_text: &str) -> Result<String> {
    let cleaned = value_text.replace('_', " ");

    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in cleaned.chars() {
        match c {
            ' ' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '.' | '0'..='9' => current.push(c),
            other => warn!("Unexpected character in value: '{}'", other),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    match segments.as_slice() {
        [] => Err(Error::NoDigits(value_text.to_string())),
        [single] => Ok(single.clone()),
        _ => {
            let mut integer = String::new();
            let mut decimal: Option<&str> = None;

            for segment in &segments {
                if segment.contains('.') {
                    if decimal.is_some() {
                        return Err(Error::MultipleDecimalPoints(value_text.to_string()));
                    }
                    decimal = Some(segment.as_str());
                } else {
                    integer.push_str(segment);
                }
            }

            match decimal {
                Some(segment) => {
                    let (int_part, frac_part) = segment
                        .split_once('.')
                        .ok_or_else(|| Error::InvalidNumber(segment.to_string()))?;
                    if frac_part.contains('.') {
                        return Err(Error::InvalidNumber(segment.to_string()));
                    }
                    Ok(format!("{integer}{int_part}.{frac_part}"))
                }
                None => Ok(integer),
            }
        }
    }
}

/// Build a response frame as an indicator would send it
///
/// Used by simulators and tests; real frames only ever come off the wire.
///
/// # Examples
///
/// ```
/// use forcelink_core::response::{build_frame, decode};
///
/// let frame = build_frame(b'1', '+', "_7.487");
/// assert_eq!(decode(&frame).unwrap().value(), 7.487);
/// ```
pub fn build_frame(address_byte: u8, sign: char, value_text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(value_text.len() + 4);
    buf.put_u8(STX);
    buf.put_u8(address_byte);
    let mut sign_buf = [0u8; 4];
    buf.put_slice(sign.encode_utf8(&mut sign_buf).as_bytes());
    buf.put_slice(value_text.as_bytes());
    buf.put_u8(ETX);
    buf.freeze()
}
