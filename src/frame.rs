//! Gap-timed framing of the telemetry byte stream.
//!
//! The controller sends a bare 15-byte frame roughly every 100 ms: no length
//! prefix, no delimiter, no checksum. The only boundary signal is silence on
//! the line. A frame is closed once the gap after its last byte exceeds the
//! threshold (40 ms by default); whatever accumulated is emitted if it is
//! exactly 15 bytes and discarded otherwise.
//!
//! This resynchronizes on its own after noise, a dropped byte, or opening the
//! port mid-frame, at the cost of losing the frame that was in flight.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::config::FRAME_GAP_MS;
use crate::error::hex_string;
use crate::protocol::TELEMETRY_FRAME_LEN;

/// A complete, correctly sized telemetry frame.
pub type TelemetryFrame = [u8; TELEMETRY_FRAME_LEN];

/// Splits a timed byte stream into telemetry frames. Buffers partial data
/// across calls, so it can be fed whatever chunk sizes the port returns.
#[derive(Debug)]
pub struct GapFramer {
    pending: Vec<u8>,
    last_byte_at: Option<Instant>,
    gap: Duration,
}

impl GapFramer {
    pub fn new(gap: Duration) -> Self {
        Self {
            pending: Vec::with_capacity(64),
            last_byte_at: None,
            gap,
        }
    }

    /// Bytes accumulated toward the frame currently in flight.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed one byte that arrived at `at`.
    ///
    /// Returns the previous frame if this byte follows a gap longer than the
    /// threshold and the bytes before the gap formed a full frame.
    pub fn push(&mut self, byte: u8, at: Instant) -> Option<TelemetryFrame> {
        let frame = match self.last_byte_at {
            Some(last) if at.saturating_duration_since(last) > self.gap => self.finalize(),
            _ => None,
        };
        self.pending.push(byte);
        self.last_byte_at = Some(at);
        frame
    }

    /// Feed a chunk of bytes that all arrived at `at`.
    ///
    /// Only the first byte of a chunk can follow a gap, so a single read
    /// closes at most one frame.
    pub fn feed(&mut self, bytes: &[u8], at: Instant) -> Option<TelemetryFrame> {
        let mut frame = None;
        for &b in bytes {
            if let Some(f) = self.push(b, at) {
                frame = Some(f);
            }
        }
        frame
    }

    /// Close the pending frame if the line has been quiet past the threshold.
    ///
    /// Call this whenever a read returns no data.
    pub fn poll(&mut self, now: Instant) -> Option<TelemetryFrame> {
        let last = self.last_byte_at?;
        if now.saturating_duration_since(last) <= self.gap || self.pending.is_empty() {
            return None;
        }
        let frame = self.finalize();
        self.last_byte_at = None;
        frame
    }

    fn finalize(&mut self) -> Option<TelemetryFrame> {
        let frame = TelemetryFrame::try_from(self.pending.as_slice()).ok();
        if frame.is_none() {
            trace!(
                len = self.pending.len(),
                bytes = %hex_string(&self.pending),
                "dropping malformed frame"
            );
        }
        self.pending.clear();
        frame
    }
}

impl Default for GapFramer {
    fn default() -> Self {
        Self::new(Duration::from_millis(FRAME_GAP_MS))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn frame(seed: u8) -> TelemetryFrame {
        let mut f = [0u8; TELEMETRY_FRAME_LEN];
        for (i, b) in f.iter_mut().enumerate() {
            *b = seed.wrapping_add(i as u8);
        }
        f
    }

    #[test]
    fn frame_closed_by_idle_poll() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        assert_eq!(framer.feed(&frame(1), t0), None);
        assert_eq!(framer.poll(t0 + ms(40)), None, "gap must exceed the threshold");
        assert_eq!(framer.poll(t0 + ms(41)), Some(frame(1)));
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn frame_closed_by_next_byte() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        framer.feed(&frame(1), t0);
        assert_eq!(framer.feed(&frame(50), t0 + ms(100)), Some(frame(1)));
        assert_eq!(framer.pending_len(), TELEMETRY_FRAME_LEN);
    }

    #[test]
    fn resync_drops_short_group() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        let mut emitted = Vec::new();

        emitted.extend(framer.feed(&frame(1), t0));
        emitted.extend(framer.feed(&[0xAA, 0xBB, 0xCC], t0 + ms(41)));
        emitted.extend(framer.feed(&frame(100), t0 + ms(82)));
        emitted.extend(framer.poll(t0 + ms(123)));

        assert_eq!(emitted, vec![frame(1), frame(100)]);
    }

    #[test]
    fn split_chunks_reassemble() {
        let t0 = Instant::now();
        let whole = frame(7);
        let mut framer = GapFramer::default();

        assert_eq!(framer.feed(&whole[..1], t0), None);
        assert_eq!(framer.feed(&whole[1..2], t0 + ms(10)), None);
        assert_eq!(framer.feed(&whole[2..], t0 + ms(20)), None);
        assert_eq!(framer.poll(t0 + ms(50)), None);
        assert_eq!(framer.poll(t0 + ms(61)), Some(whole));
    }

    #[test]
    fn byte_at_a_time_within_threshold() {
        let t0 = Instant::now();
        let whole = frame(3);
        let mut framer = GapFramer::default();
        for (i, &b) in whole.iter().enumerate() {
            assert_eq!(framer.push(b, t0 + ms(i as u64 * 5)), None);
        }
        assert_eq!(framer.poll(t0 + ms(14 * 5 + 41)), Some(whole));
    }

    #[test]
    fn oversized_group_dropped() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        framer.feed(&frame(1), t0);
        framer.feed(&[0x00], t0 + ms(5));
        assert_eq!(framer.poll(t0 + ms(100)), None);
        assert_eq!(framer.pending_len(), 0);
    }

    #[test]
    fn back_to_back_frames_without_gap_merge_and_drop() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        framer.feed(&frame(1), t0);
        framer.feed(&frame(2), t0 + ms(10));
        assert_eq!(framer.poll(t0 + ms(60)), None);
    }

    #[test]
    fn poll_after_finalize_is_quiet() {
        let t0 = Instant::now();
        let mut framer = GapFramer::default();
        framer.feed(&[0x01, 0x02], t0);
        assert_eq!(framer.poll(t0 + ms(41)), None);
        // Timer cleared: further polls do nothing until the next byte.
        assert_eq!(framer.poll(t0 + ms(500)), None);
        assert_eq!(framer.feed(&frame(9), t0 + ms(600)), None);
        assert_eq!(framer.poll(t0 + ms(641)), Some(frame(9)));
    }

    #[test]
    fn poll_before_any_byte() {
        let mut framer = GapFramer::default();
        assert_eq!(framer.poll(Instant::now()), None);
    }

    #[test]
    fn custom_gap_threshold() {
        let t0 = Instant::now();
        let mut framer = GapFramer::new(ms(20));
        framer.feed(&frame(1), t0);
        assert_eq!(framer.poll(t0 + ms(20)), None);
        assert_eq!(framer.poll(t0 + ms(21)), Some(frame(1)));

        // A 25 ms pause is a boundary here, not under the default 40 ms.
        framer.feed(&frame(2), t0 + ms(100));
        assert_eq!(framer.feed(&frame(3), t0 + ms(125)), Some(frame(2)));
    }
}
