//! Interactive terminal session: owns at most one bridge and multiplexes user
//! input with bridge events on the tokio runtime.

use super::{
    mode_line, opening_line, parse_input, render_event, render_sent, InputAction, HELP_TEXT,
    TIME_SYNC_COMMAND,
};
use crate::config::{Config, SerialConfig};
use crate::dump::DisplayMode;
use crate::serial::{BridgeEvent, EventReceiver, PortConfig, PortOpener, SerialBridge};
use anyhow::{anyhow, Result};
use log::{debug, info};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Whether the session keeps going after handling an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Terminal<O, W> {
    opener: O,
    serial: SerialConfig,
    return_sequence: String,
    mode: DisplayMode,
    out: W,
    bridge: Option<SerialBridge>,
    events: Option<EventReceiver>,
}

impl<O, W> Terminal<O, W>
where
    O: PortOpener + Clone,
    W: Write,
{
    pub fn new(config: &Config, opener: O, out: W) -> Self {
        Self {
            opener,
            serial: config.serial.clone(),
            return_sequence: config.terminal.return_sequence.clone(),
            mode: config.terminal.display_mode,
            out,
            bridge: None,
            events: None,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn is_connected(&self) -> bool {
        self.bridge.is_some()
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    /// Start a bridge for `port`, closing any session that is still open.
    pub async fn connect(&mut self, port: PortConfig) -> Result<()> {
        if self.bridge.is_some() {
            self.disconnect().await?;
        }
        self.line(&opening_line(&port, self.mode))?;
        let (bridge, events) =
            SerialBridge::start(port, self.opener.clone(), self.serial.bridge_options());
        self.bridge = Some(bridge);
        self.events = Some(events);
        Ok(())
    }

    /// Stop the current bridge, wait for its worker, and show its final events.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(bridge) = self.bridge.take() else {
            return Ok(());
        };
        let events = self.events.take();
        info!("Disconnecting from {}", bridge.config().device_path);
        tokio::task::spawn_blocking(move || bridge.join())
            .await
            .map_err(|e| anyhow!("serial bridge did not shut down cleanly: {}", e))?;
        if let Some(mut events) = events {
            while let Ok(event) = events.try_recv() {
                self.show_event(&event)?;
            }
        }
        Ok(())
    }

    /// Queue one write unit on the open bridge and echo it.
    pub fn send(&mut self, unit: Vec<u8>) -> Result<()> {
        let connected = self.bridge.as_ref().map_or(false, |b| b.is_running());
        if !connected {
            return self.line("! Not connected");
        }
        let echo = render_sent(&unit, self.mode);
        if let Some(bridge) = &self.bridge {
            bridge.send(unit);
        }
        self.line(&echo)
    }

    pub async fn handle_input(&mut self, input: &str) -> Result<Flow> {
        match parse_input(input, &self.return_sequence) {
            InputAction::Send(unit) => self.send(unit)?,
            InputAction::Connect { port, baud_rate } => {
                let cfg = PortConfig::new(
                    port.unwrap_or_else(|| self.serial.port.clone()),
                    baud_rate.unwrap_or(self.serial.baud_rate),
                );
                self.connect(cfg).await?;
            }
            InputAction::Disconnect => {
                if self.bridge.is_some() {
                    self.disconnect().await?;
                } else {
                    self.line("! Not connected")?;
                }
            }
            InputAction::SetMode(mode) => {
                self.mode = mode;
                self.line(mode_line(mode))?;
            }
            InputAction::ToggleMode => {
                self.mode = self.mode.toggled();
                self.line(mode_line(self.mode))?;
            }
            InputAction::SyncTime => self.send(TIME_SYNC_COMMAND.to_vec())?,
            InputAction::ShowTime => {
                let now = chrono::Local::now().format("%H:%M:%S").to_string();
                self.line(&format!("* Current time {}", now))?;
            }
            InputAction::ListPorts => self.list_ports()?,
            InputAction::Help => self.line(HELP_TEXT)?,
            InputAction::Quit => return Ok(Flow::Quit),
            InputAction::Invalid(reason) => self.line(&format!("! {}", reason))?,
        }
        Ok(Flow::Continue)
    }

    #[cfg(feature = "serial")]
    fn list_ports(&mut self) -> Result<()> {
        match crate::serial::list_ports() {
            Ok(ports) if ports.is_empty() => self.line("* No serial ports found"),
            Ok(ports) => {
                for p in ports {
                    let detail = match (&p.manufacturer, &p.product) {
                        (Some(m), Some(prod)) => format!(" {} {}", m, prod),
                        (Some(m), None) => format!(" {}", m),
                        (None, Some(prod)) => format!(" {}", prod),
                        (None, None) => String::new(),
                    };
                    self.line(&format!("* {} [{}]{}", p.port_name, p.port_type, detail))?;
                }
                Ok(())
            }
            Err(e) => self.line(&format!("! {}", e)),
        }
    }

    #[cfg(not(feature = "serial"))]
    fn list_ports(&mut self) -> Result<()> {
        self.line("! Port enumeration requires the 'serial' feature")
    }

    fn show_event(&mut self, event: &BridgeEvent) -> Result<()> {
        let text = render_event(event, self.mode);
        self.line(&text)
    }

    /// Render one bridge event; a `Closed` event ends the session.
    pub fn handle_event(&mut self, event: BridgeEvent) -> Result<()> {
        self.show_event(&event)?;
        if event == BridgeEvent::Closed {
            debug!("Bridge reported closed; releasing session");
            self.bridge = None;
            self.events = None;
        }
        Ok(())
    }

    /// Next event from the active bridge; pending forever when disconnected.
    pub async fn next_event(&mut self) -> Option<BridgeEvent> {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Drive the session until input ends or `:quit`, then close the port.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if self.handle_input(&line).await? == Flow::Quit {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                event = self.next_event() => {
                    match event {
                        Some(event) => self.handle_event(event)?,
                        None => {
                            self.bridge = None;
                            self.events = None;
                        }
                    }
                }
            }
        }
        self.disconnect().await
    }
}
