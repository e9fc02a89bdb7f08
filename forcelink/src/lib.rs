//! # forcelink
//!
//! Async driver for digital load-cell indicators speaking the STX/ETX framed
//! ASCII protocol over a serial line (or a serial-to-Ethernet converter).
//!
//! ## Features
//!
//! - Frame reassembly from arbitrarily chunked byte streams
//! - Address-correlated request/response with bounded timeouts
//! - Operational state machine with pushed status events
//! - Drop-in simulated device for tests and demos
//!
//! ## Quick Start
//!
//! ```no_run
//! use forcelink::{LoadCell, LoadCellController};
//!
//! #[tokio::main]
//! async fn main() -> forcelink::Result<()> {
//!     let mut cell = LoadCellController::serial("/dev/ttyUSB0", 1)?;
//!     cell.connect().await?;
//!
//!     cell.auto_zero().await?;
//!     println!("{:.3}", cell.read_value().await?);
//!
//!     cell.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod mock;
pub mod protocol;

// Re-exports
pub use config::ControllerConfig;
pub use controller::LoadCellController;
pub use device::LoadCell;
pub use error::{Error, ErrorKind, Result};
pub use mock::{MockHandle, MockLoadCell, MockSnapshot};
pub use protocol::Protocol;

// Re-export types
pub use forcelink_core::{Command, Response};
pub use forcelink_types::{
    ConnectionStatus, DataBits, DeviceStatus, OperationalState, Parity, PeakReading,
    SerialSettings, StatusEvent, StopBits,
};
