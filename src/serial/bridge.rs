//! Serial bridge worker.
//!
//! A [`SerialBridge`] owns one serial port on a dedicated thread. Each loop
//! iteration performs one bounded read and then writes at most one queued
//! write unit, so reads and writes never need ordering against each other.
//! Everything the worker observes, including failure to open the port, is
//! reported asynchronously as a [`BridgeEvent`] on an ordered channel.

use super::{BridgeError, PortConfig, PortOpener, SerialLink};
use crate::dump::hex_dump;
use log::{debug, error, info, trace, warn};
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound on a single read, whatever the driver reports as waiting.
const MAX_READ_CHUNK: usize = 4096;

/// Events emitted by the bridge worker, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Port opened and stale input discarded.
    Opened,
    /// Port could not be opened; the loop never started.
    OpenFailed(String),
    /// Bytes read from the device, one event per read.
    Data(Vec<u8>),
    /// Read or write failed after a successful open; the session is over.
    IoFailed(String),
    /// Worker finished and the port (if any) was released. Always last.
    Closed,
}

pub type EventReceiver = mpsc::UnboundedReceiver<BridgeEvent>;

/// Worker timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Longest a single read may block waiting for the first byte.
    pub read_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(500),
        }
    }
}

impl BridgeOptions {
    pub fn with_read_timeout(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    /// Pause after opening before stale input is flushed (1.2x the read timeout).
    pub fn settle_delay(&self) -> Duration {
        self.read_timeout * 6 / 5
    }
}

/// Handle to a running bridge worker.
///
/// Dropping the handle requests a stop but does not wait for the worker.
pub struct SerialBridge {
    config: PortConfig,
    running: Arc<AtomicBool>,
    outgoing_tx: mpsc::UnboundedSender<Vec<u8>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialBridge {
    /// Spawn the worker and return immediately. The port is opened on the
    /// worker thread; the outcome arrives as `Opened` or `OpenFailed`.
    pub fn start<O: PortOpener>(
        config: PortConfig,
        opener: O,
        options: BridgeOptions,
    ) -> (Self, EventReceiver) {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let running = Arc::new(AtomicBool::new(true));

        let worker = BridgeWorker {
            config: config.clone(),
            options,
            running: running.clone(),
            outgoing_rx,
            event_tx: event_tx.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(format!("serial-bridge {}", config.device_path))
            .spawn(move || worker.run(opener));

        let worker = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!("Failed to spawn serial bridge thread: {}", e);
                running.store(false, Ordering::SeqCst);
                let _ = event_tx.send(BridgeEvent::OpenFailed(format!(
                    "failed to start worker: {}",
                    e
                )));
                let _ = event_tx.send(BridgeEvent::Closed);
                None
            }
        };

        (
            SerialBridge {
                config,
                running,
                outgoing_tx,
                worker,
            },
            event_rx,
        )
    }

    /// Queue one write unit. Never blocks; empty units are ignored and units
    /// queued after the worker has exited are dropped.
    pub fn send(&self, unit: impl Into<Vec<u8>>) {
        let unit = unit.into();
        if unit.is_empty() {
            return;
        }
        if self.outgoing_tx.send(unit).is_err() {
            debug!("Bridge for {} is gone; dropping write unit", self.config.device_path);
        }
    }

    /// Ask the worker to finish after its current iteration. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Stop the worker and wait for it to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Serial bridge thread for {} panicked", self.config.device_path);
            }
        }
    }
}

impl Drop for SerialBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

struct BridgeWorker {
    config: PortConfig,
    options: BridgeOptions,
    running: Arc<AtomicBool>,
    outgoing_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl BridgeWorker {
    fn run<O: PortOpener>(mut self, opener: O) {
        info!(
            "Opening {} at {} baud",
            self.config.device_path, self.config.baud_rate
        );

        let mut port = match self.open_port(&opener) {
            Ok(port) => port,
            Err(e) => {
                warn!("Can't open port {}: {}", self.config.device_path, e);
                self.running.store(false, Ordering::SeqCst);
                self.emit(BridgeEvent::OpenFailed(e.to_string()));
                self.emit(BridgeEvent::Closed);
                return;
            }
        };
        self.emit(BridgeEvent::Opened);

        if let Err(e) = self.pump(port.as_mut()) {
            error!("Serial session on {} failed: {}", self.config.device_path, e);
            self.emit(BridgeEvent::IoFailed(e.to_string()));
        }

        self.running.store(false, Ordering::SeqCst);
        drop(port);
        self.outgoing_rx.close();
        let mut dropped = 0usize;
        while self.outgoing_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} unsent write unit(s)", dropped);
        }
        info!("Closed {}", self.config.device_path);
        self.emit(BridgeEvent::Closed);
    }

    fn open_port<O: PortOpener>(&self, opener: &O) -> Result<Box<dyn SerialLink>, BridgeError> {
        self.config.validate()?;
        let mut port = opener.open(&self.config, self.options.read_timeout)?;
        std::thread::sleep(self.options.settle_delay());
        if let Err(e) = port.clear_input() {
            // Stale bytes will show up as data; not worth failing the session.
            warn!("Could not flush input on {}: {}", self.config.device_path, e);
        }
        debug!("Serial port {} initialized", self.config.device_path);
        Ok(port)
    }

    fn pump(&mut self, port: &mut dyn SerialLink) -> Result<(), BridgeError> {
        while self.running.load(Ordering::SeqCst) {
            let chunk = read_bounded(port)?;
            if !chunk.is_empty() {
                trace!("RX {} bytes: {}", chunk.len(), hex_dump(&chunk[..chunk.len().min(64)]));
                self.emit(BridgeEvent::Data(chunk));
            }

            if let Ok(unit) = self.outgoing_rx.try_recv() {
                port.write_all(&unit)?;
                port.flush()?;
                debug!("TX {} bytes", unit.len());
            }
        }
        Ok(())
    }

    fn emit(&self, event: BridgeEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.event_tx.send(event);
    }
}

/// Read what the driver has waiting, or block up to the port timeout for at
/// least one byte. A timeout yields an empty buffer.
fn read_bounded(port: &mut dyn SerialLink) -> Result<Vec<u8>, BridgeError> {
    let waiting = port.bytes_to_read()? as usize;
    let mut buf = vec![0u8; waiting.clamp(1, MAX_READ_CHUNK)];
    match port.read(&mut buf) {
        Ok(0) => Err(BridgeError::Disconnected),
        Ok(n) => {
            buf.truncate(n);
            Ok(buf)
        }
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
            ) =>
        {
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
