pub mod codec;
pub mod config;
pub mod conn;
pub mod error;
pub mod frame;
pub mod history;
pub mod monitor;
pub mod protocol;

pub use config::{Limits, SessionConfig};
pub use conn::{Event, Port, Session, Status, list_ports};
pub use error::{ConnectionError, DecodeError, EncodeError, SendError};
pub use frame::{GapFramer, TelemetryFrame};
pub use history::{History, PlotSeries};
pub use monitor::Monitor;
pub use protocol::Mode;
pub use protocol::command::Command;
pub use protocol::telemetry::Sample;
