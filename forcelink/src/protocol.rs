//! Request/response correlation
//!
//! The indicator has no sequence numbers: a response is matched to its
//! request purely by device address. [`Protocol`] sends one command,
//! then polls the transport until a valid frame for the same address
//! turns up or the deadline passes.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace, warn};

use forcelink_core::{Command, FrameBuffer, Response, command, constants, response};
use forcelink_transport::Transport;

use crate::error::{Error, Result};

/// Protocol orchestrator bound to one transport
pub struct Protocol {
    transport: Box<dyn Transport>,
    buffer: FrameBuffer,
    poll_interval: Duration,
    min_command_interval: Duration,
    last_command_at: Option<Instant>,
    last_discarded: Option<Bytes>,
}

impl Protocol {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            buffer: FrameBuffer::new(),
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            min_command_interval: Duration::ZERO,
            last_command_at: None,
            last_discarded: None,
        }
    }

    /// Set the frame buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer = FrameBuffer::with_capacity(capacity);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_min_command_interval(mut self, interval: Duration) -> Self {
        self.min_command_interval = interval;
        self
    }

    pub fn port_name(&self) -> String {
        self.transport.port_name()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn connect(&mut self) -> forcelink_transport::Result<()> {
        self.buffer.clear();
        self.transport.connect().await
    }

    pub async fn disconnect(&mut self) -> forcelink_transport::Result<()> {
        self.buffer.clear();
        self.transport.disconnect().await
    }

    /// Last frame that was received but could not be used
    ///
    /// Reset at the start of each request.
    pub fn last_discarded(&self) -> Option<&Bytes> {
        self.last_discarded.as_ref()
    }

    /// Send READ and wait for the matching response
    ///
    /// Returns `Ok(None)` if no valid response for `device_address`
    /// arrived within `timeout`. Frames from other addresses and frames
    /// that fail to decode are skipped.
    pub async fn request_value(
        &mut self,
        device_address: u16,
        timeout: Duration,
    ) -> Result<Option<Response>> {
        self.buffer.clear();
        self.last_discarded = None;

        let request = encode(device_address, Command::Read)?;
        self.transmit(device_address, "read", &request).await?;

        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let chunk = self
                .transport
                .receive(constants::READ_CHUNK_SIZE, self.poll_interval.min(remaining))
                .await
                .map_err(|e| self.transport_error("read", device_address, e))?;

            if chunk.is_empty() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                sleep(self.poll_interval.min(remaining)).await;
                continue;
            }

            self.buffer.append(&chunk);

            while let Some(frame) = self.buffer.try_extract_frame() {
                match response::decode(&frame) {
                    Some(response) if !response.is_valid() => {
                        debug!("Ignoring invalid response: {}", response);
                        self.last_discarded = Some(frame);
                    }
                    Some(response) if response.device_address() == device_address => {
                        trace!(address = device_address, "Matched response: {}", response);
                        return Ok(Some(response));
                    }
                    Some(response) => {
                        warn!(
                            expected = device_address,
                            received = response.device_address(),
                            "Device address mismatch, still waiting"
                        );
                    }
                    None => {
                        self.last_discarded = Some(frame);
                    }
                }
            }
        }

        warn!(
            address = device_address,
            "No response within {} ms",
            timeout.as_millis()
        );

        Ok(None)
    }

    /// Send a control command that has no response frame
    pub async fn send_control(&mut self, device_address: u16, command: Command) -> Result<()> {
        if !command.is_control() {
            return Err(Error::validation(
                "command",
                format!("{command} expects a response; use request_value"),
            ));
        }

        let request = encode(device_address, command)?;
        self.transmit(device_address, command.name(), &request).await
    }

    async fn transmit(
        &mut self,
        device_address: u16,
        operation: &'static str,
        data: &[u8],
    ) -> Result<()> {
        self.pace().await;

        self.transport
            .send(data)
            .await
            .map_err(|e| self.transport_error(operation, device_address, e))?;

        self.last_command_at = Some(Instant::now());
        Ok(())
    }

    async fn pace(&self) {
        if self.min_command_interval.is_zero() {
            return;
        }

        if let Some(last) = self.last_command_at {
            let elapsed = last.elapsed();
            if elapsed < self.min_command_interval {
                let wait = self.min_command_interval - elapsed;
                trace!("Pacing command by {} ms", wait.as_millis());
                sleep(wait).await;
            }
        }
    }

    fn transport_error(
        &self,
        operation: &'static str,
        device_address: u16,
        err: forcelink_transport::Error,
    ) -> Error {
        match err {
            forcelink_transport::Error::NotConnected => {
                Error::connection(self.transport.port_name(), err)
            }
            err => Error::operation(operation, device_address, err),
        }
    }
}

fn encode(device_address: u16, command: Command) -> Result<Bytes> {
    command::encode(u32::from(device_address), command)
        .map_err(|e| Error::validation("device address", e))
}
