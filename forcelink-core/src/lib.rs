//! # forcelink-core
//!
//! Core protocol implementation for STX/ETX framed load-cell indicators.
//!
//! This crate provides the low-level protocol primitives:
//! - Command definitions and encoding
//! - Device address codec
//! - Frame buffering and extraction
//! - Response decoding (including padded value reconstruction)
//! - Protocol constants

pub mod address;
pub mod command;
pub mod constants;
pub mod error;
pub mod frame;
pub mod response;

pub use command::Command;
pub use error::{Error, Result};
pub use frame::FrameBuffer;
pub use response::Response;

/// Protocol version information
pub const PROTOCOL_VERSION: &str = "1.0";
