//! Serial session with the rig controller.
//!
//! Owns the port, runs a background read loop that feeds [`GapFramer`] and
//! decodes complete frames, and exposes a synchronous send. Decoded samples
//! and link status changes leave the session as [`Event`]s on a channel; the
//! consumer (usually a [`Monitor`](crate::monitor::Monitor)) owns the
//! history, so nothing here locks around sample storage.
//!
//! The read loop holds its own duplicate of the port handle. The write handle
//! sits behind a mutex that serializes `send` against teardown, so reads and
//! writes proceed concurrently on the two directions of the line.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::{ConnectionError, SendError, hex_string};
use crate::frame::GapFramer;
use crate::protocol::COMMAND_FRAME_LEN;
use crate::protocol::command::Command;
use crate::protocol::telemetry::Sample;

/// Upper bound on how long `disconnect()` waits for the read loop to exit.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Pause after a read that returned nothing.
const IDLE_SLEEP: Duration = Duration::from_millis(5);

const READ_CHUNK: usize = 256;

/// A byte link the session can drive.
///
/// Implemented for `serialport` handles. The session needs one duplicate
/// handle for its read loop, hence `try_clone_port`.
pub trait Port: Read + Write + Send {
    fn try_clone_port(&self) -> io::Result<Box<dyn Port>>;

    /// Discard bytes already sitting in the driver's buffers.
    fn discard_buffers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for Box<dyn SerialPort> {
    fn try_clone_port(&self) -> io::Result<Box<dyn Port>> {
        let clone = self.try_clone()?;
        Ok(Box::new(clone))
    }

    fn discard_buffers(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}

/// Link state changes reported to the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Connected { port: String, baud_rate: u32 },
    Disconnected,
    /// A command frame went out on the wire.
    Sent(Vec<u8>),
    /// The link failed and has been closed.
    Error(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Connected { port, baud_rate } => {
                write!(f, "Connected to {port} @ {baud_rate} bps")
            }
            Status::Disconnected => write!(f, "Disconnected."),
            Status::Sent(bytes) => write!(f, "Sent: {}", hex_string(bytes)),
            Status::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Everything the session reports, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Sample(Sample),
    Status(Status),
}

type SharedWriter = Arc<Mutex<Option<Box<dyn Port>>>>;

/// List serial port names available on this machine.
///
/// On macOS only the `/dev/cu.*` call-out devices are listed; the matching
/// `/dev/tty.*` nodes block on open waiting for carrier detect.
pub fn list_ports() -> Result<Vec<String>, serialport::Error> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .filter(|_name| {
            #[cfg(target_os = "macos")]
            {
                !_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .collect())
}

/// Connection lifecycle for one rig.
///
/// # Example
///
/// ```no_run
/// use tubelink::{Command, Event, Session, SessionConfig};
///
/// let (mut session, events) = Session::new(SessionConfig::default());
/// session.connect("/dev/ttyUSB0")?;
/// session.submit_command(&Command::reset())?;
/// while let Ok(event) = events.recv() {
///     match event {
///         Event::Sample(s) => println!("{} mm", s.height_measured_mm),
///         Event::Status(status) => println!("{status}"),
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Session {
    config: SessionConfig,
    /// Sample timestamps count from here.
    epoch: Instant,
    events: Sender<Event>,
    writer: SharedWriter,
    reader: Option<Reader>,
}

struct Reader {
    port: String,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Session {
    /// Create a disconnected session and the receiving end of its event
    /// channel.
    pub fn new(config: SessionConfig) -> (Self, Receiver<Event>) {
        let (events, rx) = mpsc::channel();
        let session = Self {
            config,
            epoch: Instant::now(),
            events,
            writer: Arc::new(Mutex::new(None)),
            reader: None,
        };
        (session, rx)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open `port` at the configured baud rate (8N1, no flow control) and
    /// start the read loop. Any existing connection is closed first.
    pub fn connect(&mut self, port: &str) -> Result<(), ConnectionError> {
        self.disconnect();
        let handle = serialport::new(port, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout())
            .open()
            .map_err(|source| ConnectionError::Open { port: port.to_string(), source })?;
        self.connect_port(port, Box::new(handle))
    }

    /// Start a session over an already-open link.
    ///
    /// Reads on `port` must return within a short timeout (`TimedOut` or
    /// `WouldBlock` when idle) so the loop can notice a stop request.
    pub fn connect_port(&mut self, name: &str, mut port: Box<dyn Port>) -> Result<(), ConnectionError> {
        self.disconnect();
        if let Err(e) = port.discard_buffers() {
            debug!(port = name, error = %e, "could not flush stale bytes from port buffers");
        }
        let read_half = port
            .try_clone_port()
            .map_err(|source| ConnectionError::Split { port: name.to_string(), source })?;
        *lock(&self.writer) = Some(port);

        info!(port = name, baud = self.config.baud_rate, "connected");
        self.emit(Status::Connected {
            port: name.to_string(),
            baud_rate: self.config.baud_rate,
        });

        let stop = Arc::new(AtomicBool::new(false));
        let read_loop = ReadLoop {
            name: name.to_string(),
            port: read_half,
            framer: GapFramer::new(self.config.gap_threshold()),
            epoch: self.epoch,
            stop: Arc::clone(&stop),
            writer: Arc::clone(&self.writer),
            events: self.events.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("tubelink-rx {name}"))
            .spawn(move || read_loop.run());
        match spawned {
            Ok(thread) => {
                self.reader = Some(Reader { port: name.to_string(), stop, thread });
                Ok(())
            }
            Err(source) => {
                lock(&self.writer).take();
                self.emit(Status::Error(format!("failed to start reader: {source}")));
                Err(ConnectionError::Spawn(source))
            }
        }
    }

    /// Stop the read loop and close the port. Safe to call when not
    /// connected.
    pub fn disconnect(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        reader.stop.store(true, Ordering::Relaxed);

        let deadline = Instant::now() + DISCONNECT_TIMEOUT;
        while !reader.thread.is_finished() && Instant::now() < deadline {
            thread::sleep(IDLE_SLEEP);
        }
        if reader.thread.is_finished() {
            if reader.thread.join().is_err() {
                warn!(port = %reader.port, "reader thread panicked");
            }
        } else {
            warn!(port = %reader.port, "reader thread did not stop in time, detaching");
        }

        lock(&self.writer).take();
        info!(port = %reader.port, "disconnected");
        self.emit(Status::Disconnected);
    }

    /// True while the port is open for writing.
    ///
    /// Goes false as soon as a read or write fault closes the link, before
    /// `disconnect()` reaps the read loop.
    pub fn is_connected(&self) -> bool {
        lock(&self.writer).is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        match &self.reader {
            Some(reader) if self.is_connected() => Some(reader.port.as_str()),
            _ => None,
        }
    }

    /// Write a 7-byte command frame.
    ///
    /// The size check comes first, so a wrong-size payload fails with
    /// `WrongSize` whether or not a port is open. A write fault closes the
    /// link and signals the read loop to stop.
    pub fn send(&self, bytes: &[u8]) -> Result<(), SendError> {
        if bytes.len() != COMMAND_FRAME_LEN {
            return Err(SendError::WrongSize {
                expected: COMMAND_FRAME_LEN,
                len: bytes.len(),
            });
        }

        let mut guard = lock(&self.writer);
        let port = guard.as_mut().ok_or(SendError::NotConnected)?;
        match port.write_all(bytes).and_then(|()| port.flush()) {
            Ok(()) => {
                drop(guard);
                debug!(bytes = %hex_string(bytes), "sent command");
                self.emit(Status::Sent(bytes.to_vec()));
                Ok(())
            }
            Err(e) => {
                guard.take();
                drop(guard);
                if let Some(reader) = &self.reader {
                    reader.stop.store(true, Ordering::Relaxed);
                }
                warn!(error = %e, "serial write failed, closing link");
                self.emit(Status::Error(format!("write failed: {e}")));
                Err(SendError::IoError(e))
            }
        }
    }

    /// Encode and send a command, checked against the configured limits.
    pub fn submit_command(&self, cmd: &Command) -> Result<(), SendError> {
        let frame = cmd.encode_with(&self.config.limits)?;
        self.send(&frame)
    }

    fn emit(&self, status: Status) {
        // Receiver may be gone during shutdown.
        let _ = self.events.send(Event::Status(status));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

struct ReadLoop {
    name: String,
    port: Box<dyn Port>,
    framer: GapFramer,
    epoch: Instant,
    stop: Arc<AtomicBool>,
    writer: SharedWriter,
    events: Sender<Event>,
}

impl ReadLoop {
    fn run(mut self) {
        let mut buf = [0u8; READ_CHUNK];
        while !self.stop.load(Ordering::Relaxed) {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    let now = Instant::now();
                    if let Some(frame) = self.framer.feed(&buf[..n], now) {
                        self.deliver(&frame, now);
                    }
                    continue;
                }
                Ok(_) => {}
                Err(e) if is_idle(&e) => {}
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }

            // Nothing arrived: the silence may close the pending frame.
            let now = Instant::now();
            if let Some(frame) = self.framer.poll(now) {
                self.deliver(&frame, now);
            }
            thread::sleep(IDLE_SLEEP);
        }
        debug!(port = %self.name, "read loop stopped");
    }

    fn deliver(&self, frame: &[u8], at: Instant) {
        let timestamp = at.saturating_duration_since(self.epoch).as_secs_f64();
        match Sample::decode(frame, timestamp) {
            Ok(sample) => {
                let _ = self.events.send(Event::Sample(sample));
            }
            Err(e) => trace!(error = %e, "discarding frame"),
        }
    }

    fn fail(&self, e: io::Error) {
        // Checked under the writer lock: a stopped loop belongs to a session
        // that may already have installed a new writer.
        let mut writer = lock(&self.writer);
        if self.stop.load(Ordering::Relaxed) {
            return;
        }
        warn!(port = %self.name, error = %e, "serial read failed, closing link");
        writer.take();
        drop(writer);
        let _ = self
            .events
            .send(Event::Status(Status::Error(format!("read failed: {e}"))));
    }
}

fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn lock(writer: &Mutex<Option<Box<dyn Port>>>) -> MutexGuard<'_, Option<Box<dyn Port>>> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
