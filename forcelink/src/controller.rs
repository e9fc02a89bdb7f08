//! Load-cell controller
//!
//! Owns the connection lifecycle and the operational state machine:
//!
//! ```text
//!            connect
//!  (none) ───────────► IDLE ◄──────────────┐
//!                       │ │                │ settle delay
//!          set_hold(on) │ │ auto_zero      │
//!                       ▼ └──► ZERO_SETTING┘
//!                      HOLD        │
//!                                  │ send failed
//!                                  ▼
//!                                ERROR
//! ```
//!
//! `read_peak` passes through MEASURING and returns to where it started.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use forcelink_core::{Command, Response, address};
use forcelink_transport::{SerialTransport, TcpTransport, Transport};
use forcelink_types::{
    ConnectionStatus, DeviceStatus, OperationalState, PeakReading, StatusEvent,
};

use crate::config::ControllerConfig;
use crate::device::{LoadCell, PeakWindow};
use crate::error::{Error, Result};
use crate::protocol::Protocol;

/// Capacity of the status event channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Controller for a real load-cell indicator
///
/// # Examples
///
/// ```no_run
/// use forcelink::{ControllerConfig, LoadCell, LoadCellController};
///
/// #[tokio::main]
/// async fn main() -> forcelink::Result<()> {
///     let config = ControllerConfig::new("/dev/ttyUSB0").with_device_address(1);
///     let mut cell = LoadCellController::new(config)?;
///
///     cell.connect().await?;
///     cell.auto_zero().await?;
///     println!("{}", cell.read_value().await?);
///     cell.disconnect().await;
///
///     Ok(())
/// }
/// ```
pub struct LoadCellController {
    protocol: Protocol,
    config: ControllerConfig,
    connection: ConnectionStatus,
    state: OperationalState,
    hold_enabled: bool,
    last_response: Option<Response>,
    last_error: Option<String>,
    last_read_at: Option<DateTime<Utc>>,
    events: broadcast::Sender<StatusEvent>,
}

impl LoadCellController {
    /// Create a controller on the serial port named in `config`
    pub fn new(config: ControllerConfig) -> Result<Self> {
        let transport = SerialTransport::new(config.port.clone()).with_settings(config.serial.clone());
        Self::with_transport(config, Box::new(transport))
    }

    /// Create a controller on a serial port with default settings
    pub fn serial(port: impl Into<String>, device_address: u16) -> Result<Self> {
        Self::new(ControllerConfig::new(port).with_device_address(device_address))
    }

    /// Create a controller behind a serial-to-Ethernet converter
    pub fn tcp(host: impl Into<String>, port: u16, device_address: u16) -> Result<Self> {
        let transport = TcpTransport::new(host, port);
        let config = ControllerConfig::new(transport.port_name()).with_device_address(device_address);
        Self::with_transport(config, Box::new(transport))
    }

    /// Create a controller over any transport
    pub fn with_transport(config: ControllerConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let protocol = Protocol::new(transport)
            .with_buffer_capacity(config.buffer_capacity)
            .with_poll_interval(config.poll_interval)
            .with_min_command_interval(config.min_command_interval);

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            protocol,
            config,
            connection: ConnectionStatus::Disconnected,
            state: OperationalState::Idle,
            hold_enabled: false,
            last_response: None,
            last_error: None,
            last_read_at: None,
            events,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Last response successfully read from the device
    pub fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connection.is_connected() {
            Ok(())
        } else {
            Err(Error::connection(self.protocol.port_name(), "not connected"))
        }
    }

    fn transition(&mut self, state: OperationalState, event: StatusEvent) {
        if self.state != state {
            debug!("State {} -> {}", self.state, state);
        }
        self.state = state;

        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn enter(&mut self, state: OperationalState) {
        let value = self.last_value();
        self.transition(state, StatusEvent::new(state).with_value(value));
    }

    fn fail(&mut self, err: &Error) {
        let message = err.to_string();
        let event = StatusEvent::new(OperationalState::Error)
            .with_value(self.last_value())
            .with_error(message.clone());

        self.last_error = Some(message);
        self.transition(OperationalState::Error, event);
    }

    fn last_value(&self) -> Option<f64> {
        self.last_response.as_ref().map(Response::value)
    }

    fn idle_or_hold(&self) -> OperationalState {
        if self.hold_enabled {
            OperationalState::Hold
        } else {
            OperationalState::Idle
        }
    }

    async fn read_response(&mut self) -> Result<Response> {
        self.ensure_connected()?;

        let device_address = self.device_address();
        let result = self
            .protocol
            .request_value(device_address, self.config.timeout)
            .await;

        let outcome = match result {
            Ok(Some(response)) if response.is_valid() => Ok(response),
            Ok(Some(response)) => Err(Error::communication(
                device_address,
                format!("invalid response '{}'", response.raw_text()),
            )),
            Ok(None) => {
                let err = Error::communication(
                    device_address,
                    format!(
                        "no valid response within {} ms",
                        self.config.timeout.as_millis()
                    ),
                );
                Err(match self.protocol.last_discarded() {
                    Some(raw) => err.with_raw(raw.clone()),
                    None => err,
                })
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => {
                debug!(address = device_address, "Read {}", response.value());
                self.last_response = Some(response.clone());
                self.last_read_at = Some(Utc::now());
                Ok(response)
            }
            Err(e) => {
                warn!(address = device_address, "Read failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

#[async_trait]
impl LoadCell for LoadCellController {
    async fn connect(&mut self) -> Result<()> {
        let port = self.protocol.port_name();

        if self.connection.is_connected() {
            debug!("Already connected to {}", port);
            return Ok(());
        }

        info!("Connecting to load cell on {} (ID {})...", port, self.device_address());

        if let Err(e) = self.protocol.connect().await {
            error!("Failed to open {}: {}", port, e);
            self.last_error = Some(e.to_string());
            return Err(Error::connection(port, e));
        }

        self.connection = ConnectionStatus::Connected;
        self.hold_enabled = false;
        self.last_error = None;
        self.enter(OperationalState::Idle);

        info!("Connected to load cell on {}", port);
        Ok(())
    }

    async fn disconnect(&mut self) {
        let port = self.protocol.port_name();

        if let Err(e) = self.protocol.disconnect().await {
            warn!("Error while closing {}: {}", port, e);
        }

        if self.connection.is_connected() {
            info!("Disconnected from {}", port);
        }

        self.connection = ConnectionStatus::Disconnected;
        self.hold_enabled = false;
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    async fn read_value(&mut self) -> Result<f64> {
        self.read_response().await.map(|response| response.value())
    }

    async fn read_raw_data(&mut self) -> Result<String> {
        self.read_response()
            .await
            .map(|response| response.raw_text().to_string())
    }

    async fn auto_zero(&mut self) -> Result<()> {
        self.ensure_connected()?;

        let device_address = self.device_address();
        info!(address = device_address, "Auto-zeroing...");

        self.enter(OperationalState::ZeroSetting);

        if let Err(e) = self
            .protocol
            .send_control(device_address, Command::AutoZero)
            .await
        {
            error!(address = device_address, "Auto-zero failed: {}", e);
            self.fail(&e);
            return Err(e);
        }

        sleep(self.config.zero_settle_delay).await;

        self.enter(OperationalState::Idle);
        info!(address = device_address, "Auto-zero complete");
        Ok(())
    }

    async fn set_hold(&mut self, enable: bool) -> Result<()> {
        self.ensure_connected()?;

        let device_address = self.device_address();

        if let Err(e) = self
            .protocol
            .send_control(device_address, Command::hold(enable))
            .await
        {
            warn!(address = device_address, "Failed to set hold: {}", e);
            self.last_error = Some(e.to_string());
            return Err(e);
        }

        self.hold_enabled = enable;
        self.enter(self.idle_or_hold());

        info!(
            address = device_address,
            "Hold {}",
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    fn is_hold_enabled(&self) -> bool {
        self.hold_enabled
    }

    fn set_device_address(&mut self, device_address: u32) -> Result<()> {
        let validated = address::validate(device_address)
            .map_err(|e| Error::validation("device address", e))?;

        self.ensure_connected()?;

        info!("Device address {} -> {}", self.config.device_address, validated);
        self.config.device_address = u16::from(validated);
        Ok(())
    }

    fn device_address(&self) -> u16 {
        self.config.device_address
    }

    fn state(&self) -> OperationalState {
        self.state
    }

    fn get_status(&self) -> DeviceStatus {
        DeviceStatus {
            connection: self.connection,
            port: self.protocol.port_name(),
            device_address: self.device_address(),
            state: self.state,
            hold_enabled: self.hold_enabled,
            last_value: self.last_value(),
            last_raw: self.last_response.as_ref().map(|r| r.raw_text().to_string()),
            last_error: self.last_error.clone(),
            last_read_at: self.last_read_at,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    async fn read_peak(&mut self, duration: Duration, interval: Duration) -> Result<PeakReading> {
        self.ensure_connected()?;

        let window = PeakWindow::new(duration, interval, self.config.min_command_interval)?;
        let device_address = self.device_address();
        let resume = self.idle_or_hold();

        debug!(
            address = device_address,
            "Sampling peak: {} samples every {} ms",
            window.samples,
            window.interval.as_millis()
        );

        self.enter(OperationalState::Measuring);

        let started = Instant::now();
        let mut samples = Vec::with_capacity(window.samples);
        let mut failed = 0;

        for i in 0..window.samples {
            if i > 0 {
                sleep(window.interval).await;
            }

            match self.read_value().await {
                Ok(value) => samples.push(value),
                Err(e) if e.is_recoverable() => {
                    debug!("Peak sample {} failed: {}", i + 1, e);
                    failed += 1;
                }
                Err(e) => {
                    self.enter(resume);
                    return Err(e);
                }
            }
        }

        let peak = PeakReading::from_samples(&samples, failed, started.elapsed());
        self.enter(resume);

        match peak {
            Some(peak) => {
                info!(address = device_address, "{}", peak);
                Ok(peak)
            }
            None => Err(Error::operation(
                "peak measurement",
                device_address,
                format!("all {} samples failed", window.samples),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use bytes::BytesMut;
    use forcelink_transport::MockTransport;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use crate::ErrorKind;

    fn config() -> ControllerConfig {
        ControllerConfig::new("mock0").with_timeout(Duration::from_millis(200))
    }

    /// Transport that records every write and replays queued replies
    fn scripted(replies: Arc<Mutex<VecDeque<&'static [u8]>>>) -> (MockTransport, Arc<Mutex<Vec<Vec<u8>>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut transport = MockTransport::new();

        transport.expect_connect().returning(|| Ok(()));
        transport.expect_disconnect().returning(|| Ok(()));
        transport.expect_is_connected().return_const(true);
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let log = Arc::clone(&sent);
        transport.expect_send().returning(move |data| {
            log.lock().push(data.to_vec());
            Ok(())
        });
        transport.expect_receive().returning(move |_, _| {
            Ok(replies
                .lock()
                .pop_front()
                .map(BytesMut::from)
                .unwrap_or_default())
        });

        (transport, sent)
    }

    async fn connected(replies: Vec<&'static [u8]>) -> (LoadCellController, Arc<Mutex<Vec<Vec<u8>>>>) {
        let (transport, sent) = scripted(Arc::new(Mutex::new(replies.into())));
        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        controller.connect().await.unwrap();
        (controller, sent)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_enters_idle() {
        let (transport, _) = scripted(Arc::default());
        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        let mut events = controller.subscribe();

        assert!(!controller.is_connected());
        controller.connect().await.unwrap();

        assert!(controller.is_connected());
        assert_eq!(controller.state(), OperationalState::Idle);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_reports_port() {
        let mut transport = MockTransport::new();
        transport
            .expect_connect()
            .returning(|| Err(forcelink_transport::Error::ConnectionTimeout));
        transport.expect_is_connected().return_const(false);
        transport
            .expect_port_name()
            .return_const(String::from("/dev/ttyUSB9"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        let err = controller.connect().await.unwrap_err();

        assert!(matches!(err, Error::Connection { ref port, .. } if port == "/dev/ttyUSB9"));
        assert!(!controller.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_require_connection() {
        let mut transport = MockTransport::new();
        transport.expect_send().never();
        transport.expect_receive().never();
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();

        assert_eq!(controller.read_value().await.unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(controller.read_raw_data().await.unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(controller.auto_zero().await.unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(controller.set_hold(true).await.unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(controller.set_device_address(2).unwrap_err().kind(), ErrorKind::Connection);
        assert_eq!(
            controller
                .read_peak(Duration::from_secs(1), Duration::from_millis(100))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::Connection
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_value() {
        let (mut controller, sent) = connected(vec![b"\x021+_7.487\x03"]).await;

        assert_eq!(controller.read_value().await.unwrap(), 7.487);
        assert_eq!(sent.lock().as_slice(), &[b"1R".to_vec()]);
        assert_eq!(controller.state(), OperationalState::Idle);
        assert_eq!(controller.last_response().map(|r| r.value()), Some(7.487));

        let status = controller.get_status();
        assert_eq!(status.last_value, Some(7.487));
        assert_eq!(status.last_raw.as_deref(), Some("1+_7.487"));
        assert!(status.last_read_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_raw_data() {
        let (mut controller, _) = connected(vec![b"\x021-_74.86\x03"]).await;

        assert_eq!(controller.read_raw_data().await.unwrap(), "1-_74.86");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_is_communication_error() {
        let (mut controller, _) = connected(vec![]).await;

        let started = Instant::now();
        let err = controller.read_value().await.unwrap_err();

        assert!(matches!(err, Error::Communication { address: 1, .. }));
        assert!(err.is_recoverable());
        assert!(started.elapsed() <= Duration::from_millis(220));
        assert_eq!(controller.state(), OperationalState::Idle);
        assert!(controller.get_status().last_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_carries_discarded_bytes() {
        let (mut controller, _) = connected(vec![b"\x021?7\x03"]).await;

        let err = controller.read_value().await.unwrap_err();
        match err {
            Error::Communication { raw: Some(raw), .. } => assert_eq!(raw.as_ref(), b"\x021?7\x03"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_zero_transitions() {
        let (mut controller, sent) = connected(vec![]).await;
        let mut events = controller.subscribe();

        let started = Instant::now();
        controller.auto_zero().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(sent.lock().as_slice(), &[b"1Z".to_vec()]);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::ZeroSetting);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::Idle);
        assert_eq!(controller.state(), OperationalState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_zero_failure_enters_error() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|| Ok(()));
        transport
            .expect_send()
            .returning(|_| Err(forcelink_transport::Error::WriteTimeout));
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        controller.connect().await.unwrap();
        let mut events = controller.subscribe();

        let err = controller.auto_zero().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(controller.state(), OperationalState::Error);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::ZeroSetting);

        let event = events.recv().await.unwrap();
        assert_eq!(event.state, OperationalState::Error);
        assert!(event.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_hold() {
        let (mut controller, sent) = connected(vec![]).await;

        controller.set_hold(true).await.unwrap();
        assert!(controller.is_hold_enabled());
        assert_eq!(controller.state(), OperationalState::Hold);

        controller.set_hold(false).await.unwrap();
        assert!(!controller.is_hold_enabled());
        assert_eq!(controller.state(), OperationalState::Idle);

        assert_eq!(sent.lock().as_slice(), &[b"1H".to_vec(), b"1L".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_hold_failure_keeps_state() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|| Ok(()));
        transport
            .expect_send()
            .returning(|_| Err(forcelink_transport::Error::ConnectionClosed));
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        controller.connect().await.unwrap();

        assert!(controller.set_hold(true).await.is_err());
        assert!(!controller.is_hold_enabled());
        assert_eq!(controller.state(), OperationalState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_device_address_out_of_range_does_no_io() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|| Ok(()));
        transport.expect_send().never();
        transport.expect_receive().never();
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        controller.connect().await.unwrap();

        let err = controller.set_device_address(300).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = controller.set_device_address(0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(controller.device_address(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_device_address_changes_commands() {
        let (mut controller, sent) = connected(vec![b"\x02:+_1.0\x03"]).await;

        controller.set_device_address(10).unwrap();
        assert_eq!(controller.device_address(), 10);

        assert_eq!(controller.read_value().await.unwrap(), 1.0);
        assert_eq!(sent.lock().as_slice(), &[b"AR".to_vec()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_peak() {
        let replies: Vec<&'static [u8]> = vec![
            b"\x021+_1.5\x03",
            b"\x021-_7.5\x03",
            b"",
            b"\x021+_3.0\x03",
        ];
        let (mut controller, _) = connected(replies).await;
        let mut events = controller.subscribe();

        let peak = controller
            .read_peak(Duration::from_millis(300), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(peak.peak, -7.5);
        assert_eq!(peak.samples, 3);
        assert_eq!(peak.failed_samples, 0);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::Measuring);
        assert_eq!(events.recv().await.unwrap().state, OperationalState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_peak_restores_hold() {
        let (mut controller, _) = connected(vec![b"\x021+_2.0\x03"]).await;
        controller.set_hold(true).await.unwrap();

        let peak = controller
            .read_peak(Duration::from_millis(100), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(peak.peak, 2.0);
        assert_eq!(controller.state(), OperationalState::Hold);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_peak_tolerates_failed_samples() {
        let (mut controller, _) = connected(vec![b"\x021+_4.0\x03"]).await;

        let peak = controller
            .read_peak(Duration::from_millis(200), Duration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(peak.peak, 4.0);
        assert_eq!(peak.samples, 1);
        assert_eq!(peak.failed_samples, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_peak_without_samples_fails() {
        let (mut controller, _) = connected(vec![]).await;

        let err = controller
            .read_peak(Duration::from_millis(100), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Operation);
        assert_eq!(controller.state(), OperationalState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_peak_rejects_zero_duration() {
        let (mut controller, _) = connected(vec![]).await;

        let err = controller
            .read_peak(Duration::ZERO, Duration::from_millis(100))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_always_ends_disconnected() {
        let mut transport = MockTransport::new();
        transport.expect_connect().returning(|| Ok(()));
        transport
            .expect_disconnect()
            .returning(|| Err(forcelink_transport::Error::ConnectionClosed));
        transport
            .expect_port_name()
            .return_const(String::from("mock0"));

        let mut controller = LoadCellController::with_transport(config(), Box::new(transport)).unwrap();
        controller.connect().await.unwrap();
        controller.disconnect().await;

        assert!(!controller.is_connected());
        assert_eq!(controller.get_status().to_string(), "LoadCell[mock0, ID: 1, DISCONNECTED, IDLE]");
    }
}
