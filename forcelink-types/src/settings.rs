//! Serial line settings

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl FromStr for Parity {
    type Err = Error;

    /// Accepts full names and single-letter codes (`N`, `E`, `O`, `M`, `S`)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "even" | "e" => Ok(Self::Even),
            "odd" | "o" => Ok(Self::Odd),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            other => Err(Error::Parse(format!("unknown parity '{other}'"))),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Even => "even",
            Self::Odd => "odd",
            Self::Mark => "mark",
            Self::Space => "space",
        };
        f.write_str(name)
    }
}

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataBits {
    Seven,
    #[default]
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            _ => Err(Error::Validation(format!(
                "data bits must be 7 or 8, got {value}"
            ))),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl FromStr for DataBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("invalid data bits '{s}'")))?;
        Self::try_from(value)
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Number of stop bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            _ => Err(Error::Validation(format!(
                "stop bits must be 1 or 2, got {value}"
            ))),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> u8 {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl FromStr for StopBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Parse(format!("invalid stop bits '{s}'")))?;
        Self::try_from(value)
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Serial line parameters
///
/// Defaults to 9600 baud, 8 data bits, no parity, 1 stop bit and a 1 s
/// timeout.
///
/// # Examples
///
/// ```
/// use forcelink_types::{Parity, SerialSettings};
///
/// let settings = SerialSettings::default()
///     .with_baud_rate(19200)
///     .with_parity(Parity::Even);
///
/// assert_eq!(settings.to_string(), "19200 8E1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

impl SerialSettings {
    pub const DEFAULT_BAUD_RATE: u32 = 9600;

    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the settings describe a usable line
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::Validation("baud rate must be positive".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Validation("timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: Self::DEFAULT_BAUD_RATE,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Display for SerialSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_profile() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.timeout, Duration::from_secs(1));
        assert_eq!(settings.to_string(), "9600 8N1");
    }

    #[test]
    fn test_parse_parity() {
        assert_eq!("none".parse::<Parity>().unwrap(), Parity::None);
        assert_eq!("E".parse::<Parity>().unwrap(), Parity::Even);
        assert_eq!(" Odd ".parse::<Parity>().unwrap(), Parity::Odd);
        assert_eq!("mark".parse::<Parity>().unwrap(), Parity::Mark);
        assert_eq!("space".parse::<Parity>().unwrap(), Parity::Space);
        assert!("x".parse::<Parity>().is_err());
    }

    #[test]
    fn test_data_bits() {
        assert_eq!(DataBits::try_from(7).unwrap(), DataBits::Seven);
        assert_eq!("8".parse::<DataBits>().unwrap(), DataBits::Eight);
        assert!(DataBits::try_from(5).is_err());
        assert!("eight".parse::<DataBits>().is_err());
    }

    #[test]
    fn test_stop_bits() {
        assert_eq!(StopBits::try_from(2).unwrap(), StopBits::Two);
        assert!(StopBits::try_from(3).is_err());
        assert_eq!(u8::from(StopBits::One), 1);
    }

    #[test]
    fn test_validate() {
        assert!(SerialSettings::default().validate().is_ok());
        assert!(SerialSettings::default().with_baud_rate(0).validate().is_err());
        assert!(
            SerialSettings::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_display_custom() {
        let settings = SerialSettings::default()
            .with_baud_rate(4800)
            .with_data_bits(DataBits::Seven)
            .with_parity(Parity::Odd)
            .with_stop_bits(StopBits::Two);
        assert_eq!(settings.to_string(), "4800 7O2");
    }
}
