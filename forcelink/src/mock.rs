//! Simulated load cell
//!
//! [`MockLoadCell`] implements [`LoadCell`] without any transport. Tests and
//! demos steer it through a [`MockHandle`], which shares state with the
//! device and with its optional monitoring task.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, sleep};
use tracing::{debug, info, warn};

use forcelink_core::{address, constants};
use forcelink_types::{
    ConnectionStatus, DeviceStatus, OperationalState, PeakReading, StatusEvent,
};

use crate::controller::EVENT_CHANNEL_CAPACITY;
use crate::device::{LoadCell, PeakWindow};
use crate::error::{Error, Result};

/// Readings beyond this magnitude are reported as an overload by the
/// monitoring task
pub const OVERLOAD_LIMIT: f64 = 1000.0;

const DEFAULT_BASE_VALUE: f64 = 10.0;
const DEFAULT_NOISE_LEVEL: f64 = 0.1;
const DEFAULT_READ_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct Simulation {
    base_value: f64,
    noise_level: f64,
    zero_offset: f64,
    held_value: Option<f64>,
    fault: Option<String>,

    connection: ConnectionStatus,
    state: OperationalState,
    device_address: u16,
    last_value: Option<f64>,
    last_raw: Option<String>,
    last_error: Option<String>,
    last_read_at: Option<DateTime<Utc>>,
}

impl Simulation {
    fn live_value(&self) -> f64 {
        let noise = if self.noise_level > 0.0 {
            rand::thread_rng().gen_range(-self.noise_level..=self.noise_level)
        } else {
            0.0
        };
        self.base_value + noise - self.zero_offset
    }

    fn sample(&mut self) -> std::result::Result<f64, String> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }

        let value = self.held_value.unwrap_or_else(|| self.live_value());

        self.last_value = Some(value);
        self.last_raw = Some(render_payload(self.device_address, value));
        self.last_read_at = Some(Utc::now());

        Ok(value)
    }

    fn resting_state(&self) -> OperationalState {
        if self.held_value.is_some() {
            OperationalState::Hold
        } else {
            OperationalState::Idle
        }
    }
}

/// Values the simulation is currently driven by
#[derive(Debug, Clone, PartialEq)]
pub struct MockSnapshot {
    pub base_value: f64,
    pub noise_level: f64,
    pub zero_offset: f64,
    pub held_value: Option<f64>,
    pub fault: Option<String>,
}

/// Shared control over a [`MockLoadCell`]
///
/// Cloning is cheap; all clones steer the same simulation.
#[derive(Debug, Clone)]
pub struct MockHandle {
    inner: Arc<Mutex<Simulation>>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Simulation {
                base_value: DEFAULT_BASE_VALUE,
                noise_level: DEFAULT_NOISE_LEVEL,
                zero_offset: 0.0,
                held_value: None,
                fault: None,
                connection: ConnectionStatus::Disconnected,
                state: OperationalState::Idle,
                device_address: 1,
                last_value: None,
                last_raw: None,
                last_error: None,
                last_read_at: None,
            })),
        }
    }

    pub fn with_base_value(self, value: f64) -> Self {
        self.simulate_load_change(value);
        self
    }

    pub fn with_noise_level(self, level: f64) -> Self {
        self.simulate_noise_level(level);
        self
    }

    /// Put a different load on the cell
    pub fn simulate_load_change(&self, value: f64) {
        debug!("Simulated load -> {}", value);
        self.inner.lock().base_value = value;
    }

    /// Amplitude of the uniform noise added to every reading
    pub fn simulate_noise_level(&self, level: f64) {
        self.inner.lock().noise_level = level.abs();
    }

    /// Make every subsequent operation fail with `message`
    pub fn simulate_error_condition(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Simulated fault: {}", message);
        self.inner.lock().fault = Some(message);
    }

    pub fn reset_error_condition(&self) {
        self.inner.lock().fault = None;
    }

    pub fn snapshot(&self) -> MockSnapshot {
        let sim = self.inner.lock();
        MockSnapshot {
            base_value: sim.base_value,
            noise_level: sim.noise_level,
            zero_offset: sim.zero_offset,
            held_value: sim.held_value,
            fault: sim.fault.clone(),
        }
    }
}

impl Default for MockHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a reading the way the indicator puts it on the wire
fn render_payload(device_address: u16, value: f64) -> String {
    let sign = if value < 0.0 {
        constants::sign::MINUS
    } else {
        constants::sign::PLUS
    };

    let id = u8::try_from(device_address)
        .ok()
        .and_then(address::response_address_byte)
        .map(char::from)
        .map(String::from)
        .unwrap_or_else(|| device_address.to_string());

    format!("{id}{sign}_{:.3}", value.abs())
}

/// Simulated load cell
///
/// # Examples
///
/// ```
/// use forcelink::{LoadCell, MockHandle, MockLoadCell};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> forcelink::Result<()> {
/// let handle = MockHandle::new().with_noise_level(0.0);
/// let mut cell = MockLoadCell::with_handle(1, handle.clone());
///
/// cell.connect().await?;
/// handle.simulate_load_change(42.0);
/// assert_eq!(cell.read_value().await?, 42.0);
/// # Ok(())
/// # }
/// ```
pub struct MockLoadCell {
    port: String,
    handle: MockHandle,
    events: broadcast::Sender<StatusEvent>,
    monitor: Option<JoinHandle<()>>,
    read_delay: Duration,
    zero_settle_delay: Duration,
}

impl MockLoadCell {
    pub fn new(device_address: u16) -> Self {
        Self::with_handle(device_address, MockHandle::new())
    }

    pub fn with_handle(device_address: u16, handle: MockHandle) -> Self {
        handle.inner.lock().device_address = device_address;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            port: String::from("MOCK"),
            handle,
            events,
            monitor: None,
            read_delay: DEFAULT_READ_DELAY,
            zero_settle_delay: Duration::from_millis(constants::ZERO_SETTLE_DELAY_MS),
        }
    }

    /// Name reported in status snapshots
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Simulated time the indicator takes to answer a read
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn with_zero_settle_delay(mut self, delay: Duration) -> Self {
        self.zero_settle_delay = delay;
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Periodically read in the background and publish state changes
    ///
    /// Restarts the task if it is already running.
    pub fn start_monitoring(&mut self, interval: Duration) -> Result<()> {
        self.ensure_connected()?;

        if interval.is_zero() {
            return Err(Error::validation("monitoring interval", "must be positive"));
        }

        self.stop_monitoring();

        let handle = self.handle.clone();
        let events = self.events.clone();

        info!("Starting mock monitoring every {} ms", interval.as_millis());

        self.monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let event = {
                    let mut sim = handle.inner.lock();
                    if !sim.connection.is_connected() {
                        break;
                    }

                    let event = match sim.sample() {
                        Ok(value) if value.abs() > OVERLOAD_LIMIT => {
                            StatusEvent::new(OperationalState::Error)
                                .with_value(Some(value))
                                .with_error(format!("overload: {value:.3}"))
                        }
                        Ok(value) if sim.held_value.is_some() => {
                            StatusEvent::new(OperationalState::Hold).with_value(Some(value))
                        }
                        Ok(value) => {
                            StatusEvent::new(OperationalState::Measuring).with_value(Some(value))
                        }
                        Err(fault) => StatusEvent::new(OperationalState::Error)
                            .with_value(sim.last_value)
                            .with_error(fault),
                    };

                    if event.state == sim.state {
                        None
                    } else {
                        sim.state = event.state;
                        if let Some(error) = &event.error {
                            sim.last_error = Some(error.clone());
                        }
                        Some(event)
                    }
                };

                if let Some(event) = event {
                    debug!("Mock monitor -> {}", event.state);
                    let _ = events.send(event);
                }
            }
        }));

        Ok(())
    }

    pub fn stop_monitoring(&mut self) {
        if let Some(task) = self.monitor.take() {
            task.abort();
            debug!("Stopped mock monitoring");

            let mut sim = self.handle.inner.lock();
            if sim.state == OperationalState::Measuring {
                sim.state = sim.resting_state();
            }
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.handle.inner.lock().connection.is_connected() {
            Ok(())
        } else {
            Err(Error::connection(self.port.clone(), "not connected"))
        }
    }

    fn enter(&self, state: OperationalState) {
        let value = {
            let mut sim = self.handle.inner.lock();
            sim.state = state;
            sim.last_value
        };
        let _ = self.events.send(StatusEvent::new(state).with_value(value));
    }

    fn fail(&self, err: &Error) {
        let message = err.to_string();
        let value = {
            let mut sim = self.handle.inner.lock();
            sim.state = OperationalState::Error;
            sim.last_error = Some(message.clone());
            sim.last_value
        };
        let _ = self.events.send(
            StatusEvent::new(OperationalState::Error)
                .with_value(value)
                .with_error(message),
        );
    }

    fn record_error(&self, err: &Error) {
        self.handle.inner.lock().last_error = Some(err.to_string());
    }

    async fn read_sample(&mut self) -> Result<f64> {
        self.ensure_connected()?;

        sleep(self.read_delay).await;

        let (result, device_address) = {
            let mut sim = self.handle.inner.lock();
            (sim.sample(), sim.device_address)
        };

        match result {
            Ok(value) => {
                debug!("Mock reading: {:.3}", value);
                Ok(value)
            }
            Err(fault) => {
                let err = Error::communication(device_address, fault);
                self.record_error(&err);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl LoadCell for MockLoadCell {
    async fn connect(&mut self) -> Result<()> {
        info!("Connecting to mock load cell on {}...", self.port);

        {
            let mut sim = self.handle.inner.lock();
            sim.connection = ConnectionStatus::Connected;
            sim.held_value = None;
            sim.last_error = None;
        }
        self.enter(OperationalState::Idle);

        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stop_monitoring();

        let mut sim = self.handle.inner.lock();
        sim.connection = ConnectionStatus::Disconnected;
        sim.held_value = None;
        sim.zero_offset = 0.0;

        info!("Mock load cell disconnected");
    }

    fn is_connected(&self) -> bool {
        self.handle.inner.lock().connection.is_connected()
    }

    async fn read_value(&mut self) -> Result<f64> {
        self.read_sample().await
    }

    async fn read_raw_data(&mut self) -> Result<String> {
        self.read_sample().await?;
        Ok(self.handle.inner.lock().last_raw.clone().unwrap_or_default())
    }

    async fn auto_zero(&mut self) -> Result<()> {
        self.ensure_connected()?;

        self.enter(OperationalState::ZeroSetting);
        sleep(self.zero_settle_delay).await;

        let outcome = {
            let mut sim = self.handle.inner.lock();
            match sim.fault.clone() {
                Some(fault) => Err(Error::operation("auto zero", sim.device_address, fault)),
                None => {
                    sim.zero_offset = sim.base_value;
                    Ok(sim.zero_offset)
                }
            }
        };

        match outcome {
            Ok(offset) => {
                info!("Mock load cell zeroed (offset {:.3})", offset);
                self.enter(OperationalState::Idle);
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn set_hold(&mut self, enable: bool) -> Result<()> {
        self.ensure_connected()?;

        let state = {
            let mut sim = self.handle.inner.lock();
            if let Some(fault) = sim.fault.clone() {
                let err = Error::operation("set hold", sim.device_address, fault);
                sim.last_error = Some(err.to_string());
                return Err(err);
            }

            sim.held_value = if enable {
                Some(sim.live_value())
            } else {
                None
            };
            sim.resting_state()
        };

        self.enter(state);
        Ok(())
    }

    fn is_hold_enabled(&self) -> bool {
        self.handle.inner.lock().held_value.is_some()
    }

    fn set_device_address(&mut self, device_address: u32) -> Result<()> {
        let validated = address::validate(device_address)
            .map_err(|e| Error::validation("device address", e))?;

        self.ensure_connected()?;

        self.handle.inner.lock().device_address = u16::from(validated);
        Ok(())
    }

    fn device_address(&self) -> u16 {
        self.handle.inner.lock().device_address
    }

    fn state(&self) -> OperationalState {
        self.handle.inner.lock().state
    }

    fn get_status(&self) -> DeviceStatus {
        let sim = self.handle.inner.lock();
        DeviceStatus {
            connection: sim.connection,
            port: self.port.clone(),
            device_address: sim.device_address,
            state: sim.state,
            hold_enabled: sim.held_value.is_some(),
            last_value: sim.last_value,
            last_raw: sim.last_raw.clone(),
            last_error: sim.last_error.clone(),
            last_read_at: sim.last_read_at,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    async fn read_peak(&mut self, duration: Duration, interval: Duration) -> Result<PeakReading> {
        self.ensure_connected()?;

        let window = PeakWindow::new(duration, interval, Duration::ZERO)?;
        let resume = self.handle.inner.lock().resting_state();

        self.enter(OperationalState::Measuring);

        let started = Instant::now();
        let mut samples = Vec::with_capacity(window.samples);
        let mut failed = 0;

        for i in 0..window.samples {
            if i > 0 {
                sleep(window.interval).await;
            }
            match self.read_sample().await {
                Ok(value) => samples.push(value),
                Err(_) => failed += 1,
            }
        }

        self.enter(resume);

        PeakReading::from_samples(&samples, failed, started.elapsed()).ok_or_else(|| {
            Error::operation(
                "peak measurement",
                self.device_address(),
                format!("all {} samples failed", window.samples),
            )
        })
    }
}

impl Drop for MockLoadCell {
    fn drop(&mut self) {
        if let Some(task) = self.monitor.take() {
            task.abort();
        }
    }
}
