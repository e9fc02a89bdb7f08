//! Serial transport
//!
//! Most indicators are wired over RS-232/RS-485 at 9600 8N1.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use forcelink_types::{DataBits, Parity, SerialSettings, StopBits};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilder, SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace, warn};

use crate::{Transport, error::*};

/// Serial transport for load-cell indicators
pub struct SerialTransport {
    port: String,
    settings: SerialSettings,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create new serial transport with the default 9600 8N1 profile
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            settings: SerialSettings::default(),
            stream: None,
        }
    }

    /// Set line settings
    pub fn with_settings(mut self, settings: SerialSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set read/write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Current line settings
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn builder(&self) -> Result<SerialPortBuilder> {
        Ok(tokio_serial::new(&self.port, self.settings.baud_rate)
            .data_bits(data_bits(self.settings.data_bits))
            .parity(parity(self.settings.parity)?)
            .stop_bits(stop_bits(self.settings.stop_bits))
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.settings.timeout))
    }
}

fn parity(parity: Parity) -> Result<tokio_serial::Parity> {
    match parity {
        Parity::None => Ok(tokio_serial::Parity::None),
        Parity::Even => Ok(tokio_serial::Parity::Even),
        Parity::Odd => Ok(tokio_serial::Parity::Odd),
        Parity::Mark | Parity::Space => Err(Error::Unsupported(format!(
            "{parity} parity is not supported by the serial backend"
        ))),
    }
}

fn data_bits(bits: DataBits) -> tokio_serial::DataBits {
    match bits {
        DataBits::Seven => tokio_serial::DataBits::Seven,
        DataBits::Eight => tokio_serial::DataBits::Eight,
    }
}

fn stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        self.settings
            .validate()
            .map_err(|e| Error::Unsupported(e.to_string()))?;

        let builder = self.builder()?;

        debug!("Opening {} ({})...", self.port, self.settings);

        let stream = builder.open_native_async()?;

        // Drop whatever the indicator sent before we were listening
        if let Err(e) = stream.clear(tokio_serial::ClearBuffer::Input) {
            warn!("Failed to clear input buffer on {}: {}", self.port, e);
        }

        debug!("Opened {}", self.port);

        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing {}...", self.port);

            // Port is released on drop; flushing is best effort
            let _ = stream.flush().await;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let write_timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {}", data.len(), hex::encode_upper(data));

        timeout(write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::WriteTimeout)??;

        Ok(())
    }

    async fn receive(&mut self, max_bytes: usize, read_timeout: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::zeroed(max_bytes.max(1));

        let n = match timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => return Ok(BytesMut::new()),
        };

        if n == 0 {
            warn!("Serial port {} returned end of stream", self.port);
            return Err(Error::ConnectionClosed);
        }

        buf.truncate(n);

        trace!("Received {} bytes: {}", n, hex::encode_upper(&buf));

        Ok(buf)
    }

    fn port_name(&self) -> String {
        self.port.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport {} dropped while still open", self.port);
        }
    }
}
