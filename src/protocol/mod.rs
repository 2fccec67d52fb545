//! Frame types for both directions of the link.
//!
//! - [`Sample`](telemetry::Sample) — telemetry the controller sends every ~100 ms (15 bytes)
//! - [`Command`](command::Command) — mode/setpoint frames we send on demand (7 bytes)
//!
//! Neither direction carries a header, delimiter, or checksum. Frame
//! boundaries on the receive side are recovered from line silence by
//! [`GapFramer`](crate::frame::GapFramer).

pub mod command;
pub mod telemetry;

use std::fmt;

/// Size of a telemetry frame (controller → host).
pub const TELEMETRY_FRAME_LEN: usize = 15;
/// Size of a command frame (host → controller).
pub const COMMAND_FRAME_LEN: usize = 7;

/// Control mode byte, shared by both frame types.
///
/// Telemetry may report bytes outside 0..=3; those decode to [`Mode::Unknown`]
/// and are passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Operator drives fan and valve directly.
    Manual,
    /// Closed-loop height control through the fan.
    Fan,
    /// Closed-loop height control through the valve.
    Valve,
    /// Reset the controller.
    Reset,
    Unknown(u8),
}

impl Mode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Manual,
            1 => Self::Fan,
            2 => Self::Valve,
            3 => Self::Reset,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Manual => 0,
            Self::Fan => 1,
            Self::Valve => 2,
            Self::Reset => 3,
            Self::Unknown(b) => b,
        }
    }

    /// True for the four modes the controller defines.
    pub fn is_defined(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "Manual"),
            Self::Fan => write!(f, "Fan"),
            Self::Valve => write!(f, "Valve"),
            Self::Reset => write!(f, "Reset"),
            Self::Unknown(b) => write!(f, "Unknown({b})"),
        }
    }
}
