//! Trailing time window of decoded samples for live display.

use std::collections::VecDeque;

use crate::config::{Limits, WINDOW_SECONDS, clamp_window_seconds};
use crate::protocol::telemetry::Sample;

/// Samples in arrival order, trimmed to the last `window_seconds` on every
/// push.
///
/// Eviction is lazy: shrinking the window takes effect at the next push.
#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Sample>,
    window_seconds: u32,
}

impl History {
    /// Create an empty history; the window is clamped to [5, 600] seconds.
    pub fn new(window_seconds: u32) -> Self {
        Self {
            samples: VecDeque::new(),
            window_seconds: clamp_window_seconds(window_seconds),
        }
    }

    pub fn window_seconds(&self) -> u32 {
        self.window_seconds
    }

    /// Change the window. Returns the value actually applied.
    pub fn set_window_seconds(&mut self, seconds: u32) -> u32 {
        self.window_seconds = clamp_window_seconds(seconds);
        self.window_seconds
    }

    /// Append a sample, then evict everything older than the window measured
    /// back from this sample.
    pub fn push(&mut self, sample: Sample) {
        let cutoff = sample.timestamp - f64::from(self.window_seconds);
        self.samples.push_back(sample);
        while self.samples.front().is_some_and(|s| s.timestamp < cutoff) {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Owned copy of the retained samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Parallel series for the two stacked plots: heights in mm on one axis,
    /// fan duty and valve position in percent on the other.
    pub fn plot_series(&self, limits: &Limits) -> PlotSeries {
        let t0 = self.samples.front().map_or(0.0, |s| s.timestamp);
        let n = self.samples.len();
        let mut series = PlotSeries {
            time: Vec::with_capacity(n),
            height_setpoint_mm: Vec::with_capacity(n),
            height_measured_mm: Vec::with_capacity(n),
            fan_duty_pct: Vec::with_capacity(n),
            valve_position_pct: Vec::with_capacity(n),
        };
        for s in &self.samples {
            series.time.push(s.timestamp - t0);
            series.height_setpoint_mm.push(f64::from(s.height_setpoint_mm));
            series.height_measured_mm.push(f64::from(s.height_measured_mm));
            series.fan_duty_pct.push(s.fan_duty_percent(limits));
            series.valve_position_pct.push(s.valve_position_percent(limits));
        }
        series
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(WINDOW_SECONDS)
    }
}

/// Plot-ready columns. `time` is seconds since the oldest retained sample.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PlotSeries {
    pub time: Vec<f64>,
    pub height_setpoint_mm: Vec<f64>,
    pub height_measured_mm: Vec<f64>,
    pub fan_duty_pct: Vec<f64>,
    pub valve_position_pct: Vec<f64>,
}

impl PlotSeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Span of the time axis, never shorter than 5 s so a fresh plot does not
    /// collapse to a point.
    pub fn x_extent(&self) -> f64 {
        self.time.last().copied().unwrap_or(0.0).max(5.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Mode;

    fn sample_at(t: f64) -> Sample {
        Sample {
            timestamp: t,
            mode: Mode::Manual,
            height_setpoint_mm: 250,
            height_measured_mm: 200,
            flight_time_avg: 0,
            temperature_tenths_c: 215,
            valve_setpoint_steps: 0,
            valve_position_steps: 210,
            fan_duty_raw: 1023,
        }
    }

    fn timestamps(h: &History) -> Vec<f64> {
        h.iter().map(|s| s.timestamp).collect()
    }

    #[test]
    fn window_eviction() {
        let mut h = History::new(60);
        for t in (0..=60).step_by(10) {
            h.push(sample_at(f64::from(t)));
        }
        assert_eq!(h.len(), 7, "t=0 sits exactly on the cutoff and stays");

        h.push(sample_at(70.0));
        assert_eq!(timestamps(&h), vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0]);
    }

    #[test]
    fn window_change_applies_on_next_push() {
        let mut h = History::new(60);
        for t in 0..10 {
            h.push(sample_at(f64::from(t * 5)));
        }
        assert_eq!(h.set_window_seconds(10), 10);
        assert_eq!(h.len(), 10, "no retroactive trim");

        h.push(sample_at(50.0));
        assert_eq!(timestamps(&h), vec![40.0, 45.0, 50.0]);
    }

    #[test]
    fn window_is_clamped() {
        let mut h = History::new(1);
        assert_eq!(h.window_seconds(), 5);
        assert_eq!(h.set_window_seconds(3600), 600);
        assert_eq!(History::default().window_seconds(), 60);
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let mut h = History::default();
        h.push(sample_at(1.0));
        let snap = h.snapshot();
        h.push(sample_at(2.0));
        assert_eq!(snap.len(), 1);
        assert_eq!(h.latest().map(|s| s.timestamp), Some(2.0));
    }

    #[test]
    fn clear_empties() {
        let mut h = History::default();
        h.push(sample_at(1.0));
        h.clear();
        assert!(h.is_empty());
        assert!(h.latest().is_none());
    }

    #[test]
    fn plot_series_relative_time_and_percentages() {
        let mut h = History::default();
        h.push(sample_at(100.0));
        h.push(sample_at(100.5));
        let series = h.plot_series(&Limits::default());
        assert_eq!(series.time, vec![0.0, 0.5]);
        assert_eq!(series.height_setpoint_mm, vec![250.0, 250.0]);
        assert_eq!(series.height_measured_mm, vec![200.0, 200.0]);
        assert!((series.fan_duty_pct[0] - 100.0).abs() < 1e-9);
        assert!((series.valve_position_pct[1] - 50.0).abs() < 1e-9);
        assert_eq!(series.x_extent(), 5.0);
    }

    #[test]
    fn empty_plot_series() {
        let series = History::default().plot_series(&Limits::default());
        assert!(series.is_empty());
        assert_eq!(series.x_extent(), 5.0);
    }
}
