//! # Terminal Presenter
//!
//! Turns user input into bridge calls and bridge events into printable lines.
//!
//! Output lines carry a prefix so received data is never confused with status:
//!
//! | prefix | meaning                         |
//! |--------|---------------------------------|
//! | `< `   | bytes received from the device  |
//! | `> `   | bytes sent to the device        |
//! | `* `   | status                          |
//! | `! `   | errors                          |
//!
//! Lines typed by the user are sent with the configured return sequence
//! appended. Lines starting with `:` are local commands (see [`HELP_TEXT`]).

pub mod session;

pub use session::{Flow, Terminal};

use crate::dump::{self, DisplayMode};
use crate::serial::{BridgeEvent, PortConfig};

/// Device command that sets the logger clock, sent whole by `:sync`.
pub const TIME_SYNC_COMMAND: [u8; 7] = [0xFE, 0x44, 0x00, 0x08, 0x02, 0x9F, 0x25];

pub const HELP_TEXT: &str = "\
Commands:
  :connect [port] [baud]  open a port (defaults from config)
  :disconnect             close the current port
  :hex | :text | :mode    show received data as hex, text, or toggle
  :send <hex bytes>       send raw bytes, e.g. :send FE 44 00
  :sync                   send the time-sync command
  :time                   show the host clock
  :ports                  list serial devices
  :help                   this text
  :quit                   close the port and exit
Any other line is sent to the device; start it with '::' to send a leading ':'.";

/// What a line of user input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Send(Vec<u8>),
    Connect {
        port: Option<String>,
        baud_rate: Option<u32>,
    },
    Disconnect,
    SetMode(DisplayMode),
    ToggleMode,
    SyncTime,
    ShowTime,
    ListPorts,
    Help,
    Quit,
    Invalid(String),
}

/// Classify one line of input (without its trailing newline).
pub fn parse_input(line: &str, return_sequence: &str) -> InputAction {
    if let Some(literal) = line.strip_prefix("::") {
        return InputAction::Send(format!(":{}{}", literal, return_sequence).into_bytes());
    }
    let Some(command) = line.strip_prefix(':') else {
        return InputAction::Send(format!("{}{}", line, return_sequence).into_bytes());
    };

    let mut parts = command.split_whitespace();
    let verb = parts.next().unwrap_or("").to_ascii_lowercase();
    match verb.as_str() {
        "connect" | "c" => {
            let port = parts.next().map(str::to_string);
            let baud_rate = match parts.next() {
                Some(b) => match b.parse::<u32>() {
                    Ok(v) if v > 0 => Some(v),
                    _ => return InputAction::Invalid(format!("bad baud rate '{}'", b)),
                },
                None => None,
            };
            InputAction::Connect { port, baud_rate }
        }
        "disconnect" | "d" => InputAction::Disconnect,
        "hex" => InputAction::SetMode(DisplayMode::Hex),
        "text" => InputAction::SetMode(DisplayMode::Text),
        "mode" => InputAction::ToggleMode,
        "send" => {
            let rest = command.trim_start()[verb.len()..].trim();
            match dump::parse_hex(rest) {
                Ok(bytes) if !bytes.is_empty() => InputAction::Send(bytes),
                Ok(_) => InputAction::Invalid("nothing to send".to_string()),
                Err(e) => InputAction::Invalid(e.to_string()),
            }
        }
        "sync" => InputAction::SyncTime,
        "time" => InputAction::ShowTime,
        "ports" => InputAction::ListPorts,
        "help" | "h" | "?" => InputAction::Help,
        "quit" | "q" | "exit" => InputAction::Quit,
        "" => InputAction::Invalid("empty command".to_string()),
        other => InputAction::Invalid(format!("unknown command ':{}'", other)),
    }
}

/// Line shown when a connection attempt starts.
pub fn opening_line(config: &PortConfig, mode: DisplayMode) -> String {
    format!(
        "* Opening {} at {} baud{}",
        config.device_path,
        config.baud_rate,
        if mode == DisplayMode::Hex { " (hex display)" } else { "" }
    )
}

/// Render a bridge event as one output entry. Text-mode data may contain
/// embedded newlines, which become line breaks when printed.
pub fn render_event(event: &BridgeEvent, mode: DisplayMode) -> String {
    match event {
        BridgeEvent::Opened => "* Port open".to_string(),
        BridgeEvent::OpenFailed(reason) => format!("! Can't open port: {}", reason),
        BridgeEvent::Data(bytes) => format!("< {}", dump::render(mode, bytes)),
        BridgeEvent::IoFailed(reason) => format!("! Serial error: {}", reason),
        BridgeEvent::Closed => "* Port closed".to_string(),
    }
}

/// Echo of a unit that was queued for sending.
pub fn render_sent(unit: &[u8], mode: DisplayMode) -> String {
    match mode {
        DisplayMode::Text => format!(
            "> {}",
            dump::escape_text(unit).trim_end_matches(&['\r', '\n'][..])
        ),
        DisplayMode::Hex => format!("> {}", dump::hex_dump(unit)),
    }
}

pub fn mode_line(mode: DisplayMode) -> &'static str {
    match mode {
        DisplayMode::Hex => "* HEX mode enabled",
        DisplayMode::Text => "* HEX mode disabled",
    }
}
