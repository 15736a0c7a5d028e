//! # serialterm - Interactive Serial Terminal
//!
//! serialterm talks to RS-232 and USB-serial devices from the command line. It
//! opens a port, sends typed or pasted text, and shows everything the device
//! sends back either as escaped text or as hexadecimal.
//!
//! ## Features
//!
//! - **Serial Bridge**: A dedicated worker owns the port and interleaves bounded
//!   reads with single write units, so interactive input never starves output.
//! - **Ordered Events**: Open, data, failure and close notifications arrive on a
//!   single channel in the order they happened.
//! - **Dump Codec**: Escaped-text and hex renderings, switchable at runtime.
//! - **Local Commands**: Connect/disconnect, display mode, raw hex sends and a
//!   device time-sync command from the prompt.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serialterm::config::Config;
//! use serialterm::serial::SystemPortOpener;
//! use serialterm::terminal::Terminal;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_or_default("serialterm.toml").await?;
//!     let mut term = Terminal::new(&config, SystemPortOpener, std::io::stdout());
//!     term.connect(config.serial.port_config()).await?;
//!     term.run(tokio::io::BufReader::new(tokio::io::stdin())).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`serial`] - Port abstraction and the bridge worker
//! - [`dump`] - Escaped-text and hex renderings of raw bytes
//! - [`terminal`] - Input parsing, event rendering and the interactive session
//! - [`config`] - Configuration loading and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Terminal     │ ← input lines, rendering, display mode
//! └─────────────────┘
//!     send │ ▲ BridgeEvent
//! ┌─────────────────┐
//! │  Serial Bridge  │ ← worker thread, owns the port
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Serial Port   │
//! └─────────────────┘
//! ```

pub mod config;
pub mod dump;
pub mod serial;
pub mod terminal;
