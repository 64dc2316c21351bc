//! Telemetry batching and attention accounting
//!
//! Accumulates feature frames while the session is active, keeps the
//! running attention counters, and hands the buffer off as an immutable
//! [`Batch`] at flush time. `detach` is the one indivisible step the
//! flush path relies on: the buffer is taken and replaced with an empty
//! one before any delivery is attempted, so frames classified during a
//! network round-trip land in the next batch rather than being lost or
//! sent twice.

use std::mem;

use uuid::Uuid;

use crate::types::{Batch, FeatureFrame};

/// Frame buffer plus the monotonically increasing attention counters for
/// one session.
#[derive(Debug, Default)]
pub struct TelemetryBatcher {
    buffer: Vec<FeatureFrame>,
    eye_contact_frames: u64,
    total_frames: u64,
}

impl TelemetryBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the counters and drop any buffered frames. Called once at
    /// session start.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.eye_contact_frames = 0;
        self.total_frames = 0;
    }

    /// Buffer one classified frame.
    pub fn record(&mut self, frame: FeatureFrame, attentive: bool) {
        self.buffer.push(frame);
        self.total_frames += 1;
        if attentive {
            self.eye_contact_frames += 1;
        }
    }

    /// Rounded attention percentage, or `None` before the first frame.
    pub fn attention_pct(&self) -> Option<u8> {
        if self.total_frames == 0 {
            return None;
        }
        let pct = (self.eye_contact_frames as f64 / self.total_frames as f64) * 100.0;
        Some(pct.round() as u8)
    }

    /// Frames classified so far this session.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Atomically take the buffer as a new [`Batch`], leaving an empty
    /// buffer behind. Returns `None` when there is nothing to flush.
    pub fn detach(&mut self, session_id: Uuid) -> Option<Batch> {
        if self.buffer.is_empty() {
            return None;
        }
        let frames = mem::take(&mut self.buffer);
        Some(Batch::new(frames, session_id))
    }
}
