//! Byte-dump helpers for rendering inbound serial data.
//!
//! Two stateless transforms are provided: [`escape_text`] keeps printable
//! ASCII readable and brackets everything above `0x7E`, while [`hex_dump`]
//! renders every byte as hexadecimal. The caller chooses between them with an
//! explicit [`DisplayMode`]; nothing here keeps global state.

use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;

/// Highest byte value passed through unchanged by [`escape_text`].
pub const ESCAPE_THRESHOLD: u8 = 0x7E;

/// How inbound bytes are presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Text,
    Hex,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Text => DisplayMode::Hex,
            DisplayMode::Hex => DisplayMode::Text,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DumpError {
    #[error("invalid hex byte '{0}'")]
    InvalidByte(String),
}

/// Escape bytes above `0x7E` as `[XX]`; everything else (including `\n`)
/// passes through as the matching character.
pub fn escape_text(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        if b > ESCAPE_THRESHOLD {
            let _ = write!(&mut out, "[{:02X}]", b);
        } else {
            out.push(b as char);
        }
    }
    out
}

/// Render every byte as two uppercase hex digits separated by single spaces.
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse whitespace separated hex bytes (either case) back into raw bytes.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, DumpError> {
    text.split_whitespace()
        .map(|tok| {
            if tok.len() > 2 {
                return Err(DumpError::InvalidByte(tok.to_string()));
            }
            u8::from_str_radix(tok, 16).map_err(|_| DumpError::InvalidByte(tok.to_string()))
        })
        .collect()
}

/// Render bytes with the transform selected by `mode`.
pub fn render(mode: DisplayMode, data: &[u8]) -> String {
    match mode {
        DisplayMode::Text => escape_text(data),
        DisplayMode::Hex => hex_dump(data),
    }
}
