//! Telemetry frame (controller → host). 15 bytes, big-endian, unsigned.
//!
//! ```text
//! off  0  mode                 u8
//! off  1  height setpoint      u16  mm
//! off  3  height measured      u16  mm
//! off  5  flight time average  u16  timer counts
//! off  7  temperature          u16  0.1 °C
//! off  9  valve setpoint       u16  steps
//! off 11  valve position       u16  steps
//! off 13  fan duty             u16  0..1023
//! ```

use super::{Mode, TELEMETRY_FRAME_LEN};
use crate::codec;
use crate::config::Limits;
use crate::error::DecodeError;

/// One decoded telemetry frame, stamped with its arrival time.
///
/// Values are reported as received. Nothing outside the documented ranges is
/// clamped or rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sample {
    /// Seconds since the session epoch (monotonic).
    pub timestamp: f64,
    pub mode: Mode,
    pub height_setpoint_mm: u16,
    pub height_measured_mm: u16,
    /// Averaged ball time-of-flight in raw timer counts.
    pub flight_time_avg: u16,
    /// Temperature in tenths of a degree Celsius.
    pub temperature_tenths_c: u16,
    pub valve_setpoint_steps: u16,
    pub valve_position_steps: u16,
    /// Fan PWM duty, 0..=1023.
    pub fan_duty_raw: u16,
}

impl Sample {
    /// Decode a telemetry frame.
    ///
    /// Any 15-byte pattern decodes; every other length is rejected.
    pub fn decode(frame: &[u8], timestamp: f64) -> Result<Self, DecodeError> {
        if frame.len() != TELEMETRY_FRAME_LEN {
            return Err(DecodeError::wrong_length(TELEMETRY_FRAME_LEN, frame));
        }
        Ok(Self {
            timestamp,
            mode: Mode::from_byte(codec::read_uint8(frame, 0)?),
            height_setpoint_mm: codec::read_uint16(frame, 1)?,
            height_measured_mm: codec::read_uint16(frame, 3)?,
            flight_time_avg: codec::read_uint16(frame, 5)?,
            temperature_tenths_c: codec::read_uint16(frame, 7)?,
            valve_setpoint_steps: codec::read_uint16(frame, 9)?,
            valve_position_steps: codec::read_uint16(frame, 11)?,
            fan_duty_raw: codec::read_uint16(frame, 13)?,
        })
    }

    pub fn temperature_celsius(&self) -> f64 {
        f64::from(self.temperature_tenths_c) / 10.0
    }

    pub fn fan_duty_percent(&self, limits: &Limits) -> f64 {
        codec::raw_to_percent(self.fan_duty_raw, limits.max_fan_duty)
    }

    /// Measured valve position as a percentage of full travel.
    pub fn valve_position_percent(&self, limits: &Limits) -> f64 {
        codec::raw_to_percent(self.valve_position_steps, limits.max_valve_steps)
    }
}
