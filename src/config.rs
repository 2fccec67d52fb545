//! Session configuration.
//!
//! The defaults are the rig's fixed link parameters (115200 8N1, 50 ms read
//! poll, 40 ms frame gap). Nothing here is negotiated with the controller.

use std::time::Duration;

/// Default serial baud rate.
pub const BAUD_RATE: u32 = 115_200;
/// Default read poll timeout in milliseconds.
pub const READ_TIMEOUT_MS: u64 = 50;
/// Default inter-byte silence that closes a frame, in milliseconds.
pub const FRAME_GAP_MS: u64 = 40;
/// Default display window in seconds.
pub const WINDOW_SECONDS: u32 = 60;
/// Smallest display window accepted.
pub const WINDOW_SECONDS_MIN: u32 = 5;
/// Largest display window accepted.
pub const WINDOW_SECONDS_MAX: u32 = 600;

/// Upper bounds for setpoints and the raw-to-percent conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Limits {
    /// Tallest height setpoint the controller accepts (mm).
    pub max_height_mm: u16,
    /// Valve travel at 100% (steps).
    pub max_valve_steps: u16,
    /// Fan duty at 100% (raw PWM units).
    pub max_fan_duty: u16,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_height_mm: 500,
            max_valve_steps: 420,
            max_fan_duty: 1023,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub gap_threshold_ms: u64,
    /// Initial display window; clamped to [5, 600] when applied.
    pub window_seconds: u32,
    /// Drop retained samples when a new connection comes up.
    pub clear_history_on_connect: bool,
    pub limits: Limits,
}

impl SessionConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn gap_threshold(&self) -> Duration {
        Duration::from_millis(self.gap_threshold_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            read_timeout_ms: READ_TIMEOUT_MS,
            gap_threshold_ms: FRAME_GAP_MS,
            window_seconds: WINDOW_SECONDS,
            clear_history_on_connect: false,
            limits: Limits::default(),
        }
    }
}

/// Clamp a requested display window to the accepted range.
pub fn clamp_window_seconds(seconds: u32) -> u32 {
    seconds.clamp(WINDOW_SECONDS_MIN, WINDOW_SECONDS_MAX)
}
