//! Type definitions for forcelink

pub mod error;
pub mod reading;
pub mod settings;
pub mod status;

pub use error::{Error, Result};
pub use reading::PeakReading;
pub use settings::{DataBits, Parity, SerialSettings, StopBits};
pub use status::{ConnectionStatus, DeviceStatus, OperationalState, StatusEvent};
