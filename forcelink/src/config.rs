//! Controller configuration

use std::time::Duration;

use forcelink_core::{address, constants};
use forcelink_types::SerialSettings;

use crate::error::{Error, Result};

/// Configuration for a [`LoadCellController`](crate::LoadCellController)
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use forcelink::ControllerConfig;
///
/// let config = ControllerConfig::new("/dev/ttyUSB0")
///     .with_device_address(2)
///     .with_timeout(Duration::from_millis(500));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Serial port path, or `host:port` for TCP
    pub port: String,

    /// Device address used for commands (1-255)
    pub device_address: u16,

    /// Serial line settings
    pub serial: SerialSettings,

    /// How long to wait for a matching response
    pub timeout: Duration,

    /// Delay between receive polls
    pub poll_interval: Duration,

    /// Frame buffer capacity in bytes
    pub buffer_capacity: usize,

    /// Settling time after an auto-zero command
    pub zero_settle_delay: Duration,

    /// Minimum spacing between consecutive commands
    pub min_command_interval: Duration,
}

impl ControllerConfig {
    pub const DEFAULT_DEVICE_ADDRESS: u16 = 1;

    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            device_address: Self::DEFAULT_DEVICE_ADDRESS,
            serial: SerialSettings::default(),
            timeout: Duration::from_millis(constants::DEFAULT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            buffer_capacity: constants::DEFAULT_BUFFER_CAPACITY,
            zero_settle_delay: Duration::from_millis(constants::ZERO_SETTLE_DELAY_MS),
            min_command_interval: Duration::ZERO,
        }
    }

    pub fn with_device_address(mut self, device_address: u16) -> Self {
        self.device_address = device_address;
        self
    }

    pub fn with_serial(mut self, serial: SerialSettings) -> Self {
        self.serial = serial;
        self
    }

    /// Set the response timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    pub fn with_zero_settle_delay(mut self, delay: Duration) -> Self {
        self.zero_settle_delay = delay;
        self
    }

    /// Enforce a pause between commands (some RS-232 converters drop
    /// back-to-back writes)
    pub fn with_min_command_interval(mut self, interval: Duration) -> Self {
        self.min_command_interval = interval;
        self
    }

    /// Check every field before anything is opened
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(Error::validation("port", "must not be empty"));
        }

        address::validate(u32::from(self.device_address))
            .map_err(|e| Error::validation("device address", e))?;

        self.serial.validate()?;

        if self.timeout.is_zero() {
            return Err(Error::validation("timeout", "must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::validation("poll interval", "must be positive"));
        }
        if self.buffer_capacity < constants::MIN_FRAME_LEN {
            return Err(Error::validation(
                "buffer capacity",
                format!(
                    "{} is smaller than a frame ({} bytes)",
                    self.buffer_capacity,
                    constants::MIN_FRAME_LEN
                ),
            ));
        }

        Ok(())
    }
}
