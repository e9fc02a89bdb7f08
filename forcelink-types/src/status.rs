//! Controller state and status structures

use std::fmt;

use chrono::{DateTime, Utc};

/// Operational state of a load-cell controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationalState {
    /// Connected and waiting for commands
    #[default]
    Idle,

    /// Sampling values continuously
    Measuring,

    /// Displayed value frozen by the indicator
    Hold,

    /// Auto-zero in progress
    ZeroSetting,

    /// Last control operation failed
    Error,
}

impl OperationalState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Measuring => "MEASURING",
            Self::Hold => "HOLD",
            Self::ZeroSetting => "ZERO_SETTING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Connection status, gating every device operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("DISCONNECTED"),
            Self::Connected => f.write_str("CONNECTED"),
        }
    }
}

/// Point-in-time snapshot of a controller
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    /// Connection status
    pub connection: ConnectionStatus,

    /// Port or endpoint the controller talks to
    pub port: String,

    /// Device address used for commands
    pub device_address: u16,

    /// Operational state
    pub state: OperationalState,

    /// Whether hold is active
    pub hold_enabled: bool,

    /// Last successfully read value
    pub last_value: Option<f64>,

    /// Raw payload of the last successful read
    pub last_raw: Option<String>,

    /// Message of the last failed operation
    pub last_error: Option<String>,

    /// When the last successful read completed
    pub last_read_at: Option<DateTime<Utc>>,
}

impl DeviceStatus {
    pub fn new(port: impl Into<String>, device_address: u16) -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            port: port.into(),
            device_address,
            state: OperationalState::Idle,
            hold_enabled: false,
            last_value: None,
            last_raw: None,
            last_error: None,
            last_read_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LoadCell[{}, ID: {}, {}, {}",
            self.port, self.device_address, self.connection, self.state
        )?;
        if let Some(value) = self.last_value {
            write!(f, ", last: {value}")?;
        }
        write!(f, "]")
    }
}

/// Pushed to observers on every operational state transition
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    /// State entered
    pub state: OperationalState,

    /// Value associated with the transition (e.g. last value on error)
    pub value: Option<f64>,

    /// Error message for transitions into [`OperationalState::Error`]
    pub error: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(state: OperationalState) -> Self {
        Self {
            state,
            value: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_value(mut self, value: Option<f64>) -> Self {
        self.value = value;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
