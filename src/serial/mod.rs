//! # Serial Link Module
//!
//! Owns everything that touches the serial device.
//!
//! - [`bridge`] runs the worker that owns an open port, interleaving bounded
//!   reads with single-unit writes and reporting through [`BridgeEvent`]s.
//! - [`port`] abstracts the device behind [`SerialLink`] / [`PortOpener`] so the
//!   bridge can be driven by real hardware (`serial` feature) or by test doubles.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serialterm::serial::{BridgeEvent, BridgeOptions, PortConfig, SerialBridge, SystemPortOpener};
//!
//! #[tokio::main]
//! async fn main() {
//!     let cfg = PortConfig::new("/dev/ttyUSB0", 9600);
//!     let (bridge, mut events) = SerialBridge::start(cfg, SystemPortOpener, BridgeOptions::default());
//!     bridge.send(b"AT\n".to_vec());
//!     while let Some(ev) = events.recv().await {
//!         if let BridgeEvent::Closed = ev {
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod bridge;
pub mod port;

pub use bridge::{BridgeEvent, BridgeOptions, EventReceiver, SerialBridge};
#[cfg(feature = "serial")]
pub use port::{list_ports, PortInfo, SystemPortOpener};
pub use port::{PortOpener, SerialLink};

use thiserror::Error;

/// Device path and line speed for one bridge session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub device_path: String,
    pub baud_rate: u32,
}

impl PortConfig {
    pub fn new(device_path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device_path: device_path.into(),
            baud_rate,
        }
    }

    /// Reject settings no device can be opened with.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.baud_rate == 0 {
            return Err(BridgeError::InvalidBaudRate(self.baud_rate));
        }
        Ok(())
    }
}

/// Failures raised inside the bridge worker. They never cross the thread
/// boundary directly; the worker turns them into events.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid baud rate {0}")]
    InvalidBaudRate(u32),

    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("serial io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device disconnected")]
    Disconnected,
}
