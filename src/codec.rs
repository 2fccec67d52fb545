//! Field codecs for the rig's wire protocol.
//!
//! Both directions use unsigned big-endian integers only.

use crate::error::{DecodeError, EncodeError};

// ---------------------------------------------------------------------------
// Read helpers
// ---------------------------------------------------------------------------

/// Read an unsigned 8-bit integer.
pub fn read_uint8(data: &[u8], offset: usize) -> Result<u8, DecodeError> {
    check_len(data, offset, 1, "UINT8")?;
    Ok(data[offset])
}

/// Read a big-endian unsigned 16-bit integer.
pub fn read_uint16(data: &[u8], offset: usize) -> Result<u16, DecodeError> {
    check_len(data, offset, 2, "UINT16")?;
    Ok(u16::from_be_bytes([data[offset], data[offset + 1]]))
}

// ---------------------------------------------------------------------------
// Write helpers
// ---------------------------------------------------------------------------

/// Write an unsigned 8-bit integer.
pub fn write_uint8(buf: &mut Vec<u8>, val: u8) {
    buf.push(val);
}

/// Write a big-endian unsigned 16-bit integer.
pub fn write_uint16(buf: &mut Vec<u8>, val: u16) {
    buf.extend_from_slice(&val.to_be_bytes());
}

/// Write a big-endian unsigned 16-bit integer after checking it against the
/// field's documented maximum.
pub fn write_uint16_max(
    buf: &mut Vec<u8>,
    field: &'static str,
    val: u16,
    max: u16,
) -> Result<(), EncodeError> {
    if val > max {
        return Err(EncodeError::OutOfRange {
            field,
            value: u32::from(val),
            max: u32::from(max),
        });
    }
    write_uint16(buf, val);
    Ok(())
}

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

/// Convert a percentage into raw controller units.
///
/// The percentage is clamped to `[0, 100]` (NaN counts as 0) and the result
/// is rounded half away from zero.
pub fn percent_to_raw(pct: f64, max_raw: u16) -> u16 {
    let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
    (pct * f64::from(max_raw) / 100.0).round() as u16
}

/// Convert raw controller units into a percentage of `max_raw`.
///
/// A zero maximum yields 0 rather than dividing by zero.
pub fn raw_to_percent(raw: u16, max_raw: u16) -> f64 {
    if max_raw == 0 {
        return 0.0;
    }
    f64::from(raw) / f64::from(max_raw) * 100.0
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn check_len(data: &[u8], offset: usize, need: usize, field: &'static str) -> Result<(), DecodeError> {
    if data.len() < offset + need {
        Err(DecodeError::Truncated { field, offset, need, len: data.len() })
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
