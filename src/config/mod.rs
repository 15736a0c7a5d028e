//! # Configuration Management Module
//!
//! Startup configuration for the terminal, read from a TOML file. Every field
//! has a default so a partial (or missing) file still yields a usable
//! [`Config`].
//!
//! ## Configuration Structure
//!
//! - [`SerialConfig`] - Device path, line speed and read timeout
//! - [`TerminalConfig`] - Display mode and what Enter sends
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! read_timeout_ms = 500
//!
//! [terminal]
//! display_mode = "text"   # or "hex"
//! return_sequence = "\n"
//! connect_on_start = true
//!
//! [logging]
//! level = "warn"
//! # file = "serialterm.log"
//! ```
//!
//! Values given on the command line override the file: CLI args > Config file > Defaults

use crate::dump::DisplayMode;
use crate::serial::{BridgeOptions, PortConfig};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Longest a single read blocks the bridge loop (ms). Also bounds write latency.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    500
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl SerialConfig {
    pub fn port_config(&self) -> PortConfig {
        PortConfig::new(self.port.clone(), self.baud_rate)
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions::with_read_timeout(Duration::from_millis(self.read_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Appended to every typed line before it is sent.
    #[serde(default = "default_return_sequence")]
    pub return_sequence: String,
    /// Open the configured port as soon as the terminal starts.
    #[serde(default = "default_connect_on_start")]
    pub connect_on_start: bool,
}

fn default_return_sequence() -> String {
    "\n".to_string()
}

fn default_connect_on_start() -> bool {
    true
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            display_mode: DisplayMode::Text,
            return_sequence: default_return_sequence(),
            connect_on_start: default_connect_on_start(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parse `level`, falling back to `Warn` for unknown names.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Warn)
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Config::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path.display(), e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("serial.baud_rate must be greater than zero"));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(anyhow!("serial.read_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}
