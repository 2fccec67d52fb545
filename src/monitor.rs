//! Display-side consumer of session events.
//!
//! The monitor is the only owner of the [`History`]; the read loop hands it
//! samples over the session's channel. A display layer calls [`Monitor::tick`]
//! on its own schedule (every 200 ms in the terminal front-end) and renders
//! from [`Monitor::plot_series`] and [`Monitor::latest`].

use std::sync::mpsc::{Receiver, TryRecvError};

use crate::config::{Limits, SessionConfig};
use crate::conn::{Event, Status};
use crate::history::{History, PlotSeries};
use crate::protocol::telemetry::Sample;

pub struct Monitor {
    events: Receiver<Event>,
    history: History,
    limits: Limits,
    clear_on_connect: bool,
    latest: Option<Sample>,
    status: Status,
    /// Called for every sample drained by `tick()`.
    on_sample: Option<Box<dyn FnMut(&Sample)>>,
    /// Called for every status change drained by `tick()`.
    on_status: Option<Box<dyn FnMut(&Status)>>,
}

impl Monitor {
    pub fn new(events: Receiver<Event>, config: &SessionConfig) -> Self {
        Self {
            events,
            history: History::new(config.window_seconds),
            limits: config.limits,
            clear_on_connect: config.clear_history_on_connect,
            latest: None,
            status: Status::Disconnected,
            on_sample: None,
            on_status: None,
        }
    }

    /// Register a callback invoked once per decoded sample.
    pub fn set_on_sample(&mut self, f: impl FnMut(&Sample) + 'static) {
        self.on_sample = Some(Box::new(f));
    }

    /// Register a callback invoked on every connect, disconnect, send, or
    /// error.
    pub fn set_on_status(&mut self, f: impl FnMut(&Status) + 'static) {
        self.on_status = Some(Box::new(f));
    }

    /// Drain every pending event without blocking. Returns how many samples
    /// were added to the history.
    pub fn tick(&mut self) -> usize {
        let mut added = 0;
        loop {
            match self.events.try_recv() {
                Ok(Event::Sample(sample)) => {
                    self.history.push(sample);
                    self.latest = Some(sample);
                    if let Some(cb) = self.on_sample.as_mut() {
                        cb(&sample);
                    }
                    added += 1;
                }
                Ok(Event::Status(status)) => {
                    if self.clear_on_connect && matches!(status, Status::Connected { .. }) {
                        self.history.clear();
                        self.latest = None;
                    }
                    if let Some(cb) = self.on_status.as_mut() {
                        cb(&status);
                    }
                    self.status = status;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        added
    }

    /// Most recent sample, kept even after it ages out of the window.
    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.history.snapshot()
    }

    pub fn plot_series(&self) -> PlotSeries {
        self.history.plot_series(&self.limits)
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Change the display window (clamped to [5, 600] s). Returns the value
    /// applied.
    pub fn set_window_seconds(&mut self, seconds: u32) -> u32 {
        self.history.set_window_seconds(seconds)
    }
}
