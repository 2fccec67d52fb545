//! Command frame (host → controller). 7 bytes, big-endian, unsigned.
//!
//! ```text
//! off 0  mode             u8   0=Manual 1=Fan 2=Valve 3=Reset
//! off 1  height setpoint  u16  mm, 0..=max_height_mm (500)
//! off 3  valve setpoint   u16  steps, 0..=max_valve_steps (420)
//! off 5  fan duty         u16  0..=max_fan_duty (1023)
//! ```

use super::{COMMAND_FRAME_LEN, Mode};
use crate::codec;
use crate::config::Limits;
use crate::error::EncodeError;

/// Mode and setpoints sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    pub mode: Mode,
    pub height_setpoint_mm: u16,
    pub valve_setpoint_steps: u16,
    pub fan_duty_setpoint: u16,
}

impl Command {
    /// Reset: mode 3 with every setpoint zeroed.
    pub fn reset() -> Self {
        Self {
            mode: Mode::Reset,
            height_setpoint_mm: 0,
            valve_setpoint_steps: 0,
            fan_duty_setpoint: 0,
        }
    }

    /// Build a command from operator units.
    ///
    /// Height is clamped to `[0, limits.max_height_mm]`; valve and fan
    /// percentages are clamped to `[0, 100]` and scaled against the limits.
    pub fn from_percent(
        mode: Mode,
        height_mm: u16,
        valve_pct: f64,
        fan_pct: f64,
        limits: &Limits,
    ) -> Self {
        Self {
            mode,
            height_setpoint_mm: height_mm.min(limits.max_height_mm),
            valve_setpoint_steps: codec::percent_to_raw(valve_pct, limits.max_valve_steps),
            fan_duty_setpoint: codec::percent_to_raw(fan_pct, limits.max_fan_duty),
        }
    }

    /// Encode into the 7-byte wire frame, checking setpoints against the
    /// default rig limits.
    pub fn encode(&self) -> Result<[u8; COMMAND_FRAME_LEN], EncodeError> {
        self.encode_with(&Limits::default())
    }

    /// Encode into the 7-byte wire frame, checking setpoints against
    /// `limits`.
    pub fn encode_with(&self, limits: &Limits) -> Result<[u8; COMMAND_FRAME_LEN], EncodeError> {
        if !self.mode.is_defined() {
            return Err(EncodeError::UndefinedMode { raw: self.mode.as_byte() });
        }
        let mut buf = Vec::with_capacity(COMMAND_FRAME_LEN);
        codec::write_uint8(&mut buf, self.mode.as_byte());
        codec::write_uint16_max(&mut buf, "height_setpoint_mm", self.height_setpoint_mm, limits.max_height_mm)?;
        codec::write_uint16_max(&mut buf, "valve_setpoint_steps", self.valve_setpoint_steps, limits.max_valve_steps)?;
        codec::write_uint16_max(&mut buf, "fan_duty_setpoint", self.fan_duty_setpoint, limits.max_fan_duty)?;

        let mut frame = [0u8; COMMAND_FRAME_LEN];
        frame.copy_from_slice(&buf);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_encodes_to_mode_three_and_zeros() {
        let wire = Command::reset().encode().unwrap();
        assert_eq!(wire, [0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn from_percent_with_zero_setpoints_matches_reset() {
        let cmd = Command::from_percent(Mode::Reset, 0, 0.0, 0.0, &Limits::default());
        assert_eq!(cmd, Command::reset());
    }

    #[test]
    fn encode_field_order() {
        let cmd = Command {
            mode: Mode::Valve,
            height_setpoint_mm: 300,
            valve_setpoint_steps: 210,
            fan_duty_setpoint: 338,
        };
        assert_eq!(
            cmd.encode().unwrap(),
            [0x02, 0x01, 0x2C, 0x00, 0xD2, 0x01, 0x52]
        );
    }

    #[test]
    fn percentage_scaling() {
        let cmd = Command::from_percent(Mode::Manual, 250, 50.0, 33.0, &Limits::default());
        assert_eq!(cmd.valve_setpoint_steps, 210);
        assert_eq!(cmd.fan_duty_setpoint, 338);
        assert_eq!(cmd.height_setpoint_mm, 250);
    }

    #[test]
    fn from_percent_clamps_inputs() {
        let cmd = Command::from_percent(Mode::Fan, 900, 150.0, -10.0, &Limits::default());
        assert_eq!(cmd.height_setpoint_mm, 500);
        assert_eq!(cmd.valve_setpoint_steps, 420);
        assert_eq!(cmd.fan_duty_setpoint, 0);
        assert!(cmd.encode().is_ok());
    }

    #[test]
    fn out_of_range_fields_rejected() {
        let mut cmd = Command::reset();
        cmd.height_setpoint_mm = 501;
        assert!(matches!(
            cmd.encode(),
            Err(EncodeError::OutOfRange { field: "height_setpoint_mm", value: 501, max: 500 })
        ));

        let mut cmd = Command::reset();
        cmd.fan_duty_setpoint = 1024;
        assert!(matches!(cmd.encode(), Err(EncodeError::OutOfRange { max: 1023, .. })));
    }

    #[test]
    fn valve_beyond_travel_rejected() {
        let mut cmd = Command::reset();
        cmd.valve_setpoint_steps = 421;
        assert!(matches!(
            cmd.encode(),
            Err(EncodeError::OutOfRange { field: "valve_setpoint_steps", max: 420, .. })
        ));
    }

    #[test]
    fn raised_limits_encode_full_scale() {
        let limits = Limits { max_height_mm: 600, max_valve_steps: 420, max_fan_duty: 2047 };
        let cmd = Command::from_percent(Mode::Fan, 550, 0.0, 100.0, &limits);
        assert_eq!(cmd.height_setpoint_mm, 550);
        assert_eq!(cmd.fan_duty_setpoint, 2047);
        assert_eq!(
            cmd.encode_with(&limits).unwrap(),
            [0x01, 0x02, 0x26, 0x00, 0x00, 0x07, 0xFF]
        );
        // The same frame exceeds the stock rig's limits.
        assert!(cmd.encode().is_err());
    }

    #[test]
    fn lowered_limits_reject_stock_values() {
        let limits = Limits { max_height_mm: 300, ..Limits::default() };
        let mut cmd = Command::reset();
        cmd.height_setpoint_mm = 400;
        assert!(matches!(
            cmd.encode_with(&limits),
            Err(EncodeError::OutOfRange { field: "height_setpoint_mm", max: 300, .. })
        ));
    }

    #[test]
    fn undefined_mode_rejected() {
        let mut cmd = Command::reset();
        cmd.mode = Mode::Unknown(4);
        assert_eq!(cmd.encode(), Err(EncodeError::UndefinedMode { raw: 4 }));
    }
}
