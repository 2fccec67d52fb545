use std::io;

use thiserror::Error;

/// Errors arising from decoding a telemetry frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("telemetry frame must be {expected} bytes, got {len}{}", format_raw_suffix(raw))]
    WrongLength {
        expected: usize,
        len: usize,
        /// Raw frame bytes for debug context.
        raw: Vec<u8>,
    },

    #[error("{field} needs bytes {offset}..{end} but the buffer holds {len}", end = offset + need)]
    Truncated {
        field: &'static str,
        offset: usize,
        need: usize,
        len: usize,
    },
}

impl DecodeError {
    pub(crate) fn wrong_length(expected: usize, raw: &[u8]) -> Self {
        Self::WrongLength { expected, len: raw.len(), raw: raw.to_vec() }
    }
}

/// Errors arising from encoding a command frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} = {value} does not fit the wire range 0..={max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("mode byte {raw} is not a command the controller accepts")]
    UndefinedMode { raw: u8 },
}

/// Errors from opening the serial link.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("failed to split {port} into read and write handles: {source}")]
    Split {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to start the read loop: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors from transmitting a command frame.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,

    #[error("command frame must be {expected} bytes, got {len}")]
    WrongSize { expected: usize, len: usize },

    #[error("serial write failed: {0}")]
    IoError(#[from] io::Error),

    #[error("invalid command: {0}")]
    Encode(#[from] EncodeError),
}

/// Format raw bytes as a suffix like " | 01 00 FA ..." (empty if no bytes).
pub(crate) fn format_raw_suffix(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let limit = 16;
    let hex = hex_string(&raw[..raw.len().min(limit)]);
    let ellipsis = if raw.len() > limit { " ..." } else { "" };
    format!(" | {hex}{ellipsis}")
}

/// Uppercase, space-separated hex ("03 00 FA").
pub(crate) fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_length_message_carries_bytes() {
        let err = DecodeError::wrong_length(15, &[0x01, 0xFA]);
        assert_eq!(err.to_string(), "telemetry frame must be 15 bytes, got 2 | 01 FA");
    }

    #[test]
    fn truncated_message_names_range() {
        let err = DecodeError::Truncated { field: "UINT16", offset: 13, need: 2, len: 14 };
        assert_eq!(err.to_string(), "UINT16 needs bytes 13..15 but the buffer holds 14");
    }

    #[test]
    fn raw_suffix_truncates_long_buffers() {
        let raw = [0xAB; 20];
        let suffix = format_raw_suffix(&raw);
        assert!(suffix.ends_with(" ..."));
        assert_eq!(suffix.matches("AB").count(), 16);
    }

    #[test]
    fn empty_raw_has_no_suffix() {
        assert_eq!(format_raw_suffix(&[]), "");
    }
}
