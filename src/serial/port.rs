//! Port abstraction used by the bridge, plus device enumeration.

use super::{BridgeError, PortConfig};
use std::io;
use std::time::Duration;

#[cfg(feature = "serial")]
use serde::Serialize;
#[cfg(feature = "serial")]
use serialport::SerialPort;

/// The operations the bridge needs from an open serial device.
///
/// `read` follows the `serialport` contract: it blocks for at most the
/// timeout the port was opened with and reports an elapsed timeout as
/// `ErrorKind::TimedOut`.
pub trait SerialLink: Send {
    /// Bytes already buffered by the driver.
    fn bytes_to_read(&mut self) -> io::Result<u32>;
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Discard anything sitting in the driver's input buffer.
    fn clear_input(&mut self) -> io::Result<()>;
}

/// Opens a [`SerialLink`] for a [`PortConfig`]. Called once, from the bridge
/// worker thread.
pub trait PortOpener: Send + 'static {
    fn open(&self, config: &PortConfig, timeout: Duration)
        -> Result<Box<dyn SerialLink>, BridgeError>;
}

#[cfg(feature = "serial")]
impl SerialLink for Box<dyn SerialPort> {
    fn bytes_to_read(&mut self) -> io::Result<u32> {
        (**self).bytes_to_read().map_err(io::Error::from)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        (**self)
            .clear(serialport::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}

/// Opens real devices through the `serialport` crate, 8N1 without flow control.
#[cfg(feature = "serial")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPortOpener;

#[cfg(feature = "serial")]
impl PortOpener for SystemPortOpener {
    fn open(
        &self,
        config: &PortConfig,
        timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, BridgeError> {
        let port = serialport::new(config.device_path.as_str(), config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .flow_control(serialport::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| BridgeError::Open {
                path: config.device_path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(port))
    }
}

/// Information about an available serial port
#[cfg(feature = "serial")]
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List candidate devices for a connection.
///
/// On macOS only the `/dev/cu.*` call-out devices are returned; the matching
/// `/dev/tty.*` nodes block on open waiting for carrier detect.
#[cfg(feature = "serial")]
pub fn list_ports() -> anyhow::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()
        .map_err(|e| anyhow::anyhow!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => ("PCI".to_string(), None, None, None, None, None),
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            PortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}
