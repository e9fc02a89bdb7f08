//! Transport layer for forcelink
//!
//! Provides serial and TCP byte channels to load-cell indicators.

pub mod error;
pub mod serial;
pub mod tcp;

pub use error::{Error, Result};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for different communication methods
///
/// A transport is a raw byte channel. It knows nothing about frames;
/// `receive` returns whatever arrived within the timeout, which may be a
/// fraction of a frame, several frames, or nothing at all.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel
    async fn connect(&mut self) -> Result<()>;

    /// Close the channel
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive up to `max_bytes`, waiting at most `timeout`
    ///
    /// Returns an empty buffer if nothing arrived in time.
    async fn receive(&mut self, max_bytes: usize, timeout: Duration) -> Result<BytesMut>;

    /// Port name or remote endpoint, for diagnostics
    fn port_name(&self) -> String;
}
