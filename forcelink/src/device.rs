//! Load-cell device contract
//!
//! [`LoadCellController`](crate::LoadCellController) drives real hardware;
//! [`MockLoadCell`](crate::MockLoadCell) simulates it. Callers pick one at
//! construction and use either through `Box<dyn LoadCell>` or generics.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use forcelink_types::{DeviceStatus, OperationalState, PeakReading, StatusEvent};

use crate::error::{Error, Result};

/// Operations shared by every load-cell implementation
///
/// Every operation except `connect`, `disconnect` and the getters fails
/// with a connection error while disconnected.
///
/// # Examples
///
/// ```no_run
/// use forcelink::{LoadCell, LoadCellController};
///
/// #[tokio::main]
/// async fn main() -> forcelink::Result<()> {
///     let mut cell = LoadCellController::serial("/dev/ttyUSB0", 1)?;
///     cell.connect().await?;
///
///     let value = cell.read_value().await?;
///     println!("Force: {value:.3}");
///
///     cell.disconnect().await;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait LoadCell: Send {
    /// Open the channel; the device starts out idle
    async fn connect(&mut self) -> Result<()>;

    /// Close the channel
    ///
    /// Always ends disconnected. Close failures are logged, not returned.
    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Read the current force value
    async fn read_value(&mut self) -> Result<f64>;

    /// Read the current payload as sent by the indicator
    async fn read_raw_data(&mut self) -> Result<String>;

    /// Zero the indicator and wait for it to settle
    async fn auto_zero(&mut self) -> Result<()>;

    /// Freeze or release the displayed value
    async fn set_hold(&mut self, enable: bool) -> Result<()>;

    fn is_hold_enabled(&self) -> bool;

    /// Change the address used for subsequent commands
    ///
    /// Addresses outside `1..=255` are rejected before anything is stored.
    fn set_device_address(&mut self, device_address: u32) -> Result<()>;

    fn device_address(&self) -> u16;

    fn state(&self) -> OperationalState;

    /// Snapshot of connection, state and last reading
    fn get_status(&self) -> DeviceStatus;

    /// Receive an event on every operational state transition
    fn subscribe(&self) -> broadcast::Receiver<StatusEvent>;

    /// Sample the value for `duration` and return the largest magnitude
    async fn read_peak(&mut self, duration: Duration, interval: Duration) -> Result<PeakReading>;
}

/// Sampling plan for a peak measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeakWindow {
    pub samples: usize,
    pub interval: Duration,
}

impl PeakWindow {
    /// `interval` is raised to `min_interval` so sampling never outpaces
    /// the command rate limit
    pub fn new(duration: Duration, interval: Duration, min_interval: Duration) -> Result<Self> {
        if duration.is_zero() {
            return Err(Error::validation("duration", "must be positive"));
        }

        let interval = interval.max(min_interval);
        let samples = if interval.is_zero() {
            1
        } else {
            (duration.as_nanos() / interval.as_nanos()).max(1) as usize
        };

        Ok(Self { samples, interval })
    }
}
