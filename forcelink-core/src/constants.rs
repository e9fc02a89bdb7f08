//! Protocol constants

/// Start-of-text sentinel opening every response frame
pub const STX: u8 = 0x02;

/// End-of-text sentinel closing every response frame
pub const ETX: u8 = 0x03;

/// Sentinel + address + sign + one digit + sentinel
pub const MIN_FRAME_LEN: usize = 5;

/// Lowest valid device address
pub const MIN_DEVICE_ADDRESS: u32 = 1;

/// Highest valid device address
pub const MAX_DEVICE_ADDRESS: u32 = 255;

/// Lowest value the indicator can display
pub const MIN_VALUE: f64 = -999_999.0;

/// Highest value the indicator can display
pub const MAX_VALUE: f64 = 999_999.0;

/// Default frame buffer capacity (bytes)
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Default response timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default delay between transport polls (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Time the indicator needs to settle after an auto-zero (milliseconds)
pub const ZERO_SETTLE_DELAY_MS: u64 = 500;

/// Maximum bytes requested from the transport per poll
pub const READ_CHUNK_SIZE: usize = 256;

/// Response sign characters
pub mod sign {
    /// Positive reading
    pub const PLUS: char = '+';

    /// Negative reading
    pub const MINUS: char = '-';
}
