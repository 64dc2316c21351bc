//! Core types for the Gazemeter session pipeline
//!
//! This module defines the data structures that flow from a detected
//! landmark frame to the remote collector: per-frame feature records,
//! timed batches, the collector wire bodies, and the operator-facing
//! status snapshot.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detector::LandmarkPoint;

/// Current time as integer milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Compact per-frame feature record: the seven landmarks Gazemeter
/// consumes, copied out of the detector's transient frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Capture time (integer milliseconds since the Unix epoch)
    pub timestamp: i64,
    pub nose_tip: LandmarkPoint,
    pub left_ear: LandmarkPoint,
    pub right_ear: LandmarkPoint,
    pub mouth_left: LandmarkPoint,
    pub mouth_right: LandmarkPoint,
    pub chin: LandmarkPoint,
    pub forehead: LandmarkPoint,
}

/// A timestamped group of feature frames, flushed as one delivery unit.
///
/// Immutable once detached from the buffer; consumed exactly once by a
/// successful delivery, or persisted in the retry queue on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub frames: Vec<FeatureFrame>,
    /// Detach time (integer milliseconds since the Unix epoch)
    pub timestamp: i64,
    /// Session that produced the batch
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

impl Batch {
    /// Create a batch from a detached buffer, stamped now.
    pub fn new(frames: Vec<FeatureFrame>, session_id: Uuid) -> Self {
        Self {
            frames,
            timestamp: now_millis(),
            session_id: Some(session_id),
        }
    }
}

/// "Ingest batch" request body
#[derive(Debug, Clone, Serialize)]
pub struct IngestRequest<'a> {
    pub frames: &'a [FeatureFrame],
}

/// "Ingest batch" acknowledgment. Any 2xx response is success; the body
/// is informational.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub processed: Option<usize>,
}

/// "End session" request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequest {
    pub timestamp: i64,
}

/// "End session" response. The optional report string is surfaced to the
/// operator verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

/// Connection/delivery status surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// No session running
    Idle,
    /// Capture running, no face seen yet
    WaitingForFace,
    /// Calibration window open
    Calibrating,
    /// Session active, last delivery succeeded
    Healthy,
    /// Session active, delivery failing, batches queuing
    Degraded,
    /// Stop accepted, close request in flight
    GeneratingReport,
    /// Session closed, report received
    Completed,
    /// Session closed, close request failed
    ReportFailed,
}

/// Display band for the attention percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionLevel {
    Good,
    Fair,
    Poor,
}

impl AttentionLevel {
    /// Band for a displayed attention percentage: >= 70 good, >= 50 fair,
    /// else poor.
    pub fn from_pct(pct: u8) -> Self {
        if pct >= 70 {
            AttentionLevel::Good
        } else if pct >= 50 {
            AttentionLevel::Fair
        } else {
            AttentionLevel::Poor
        }
    }
}

/// Read-only status snapshot for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub delivery: DeliveryStatus,
    /// Batches delivered first-try this session (retries excluded)
    pub delivered_batches: u64,
    /// Batches currently awaiting redelivery
    pub queued_batches: usize,
    /// Seconds since the session went active, if it has
    pub elapsed_secs: Option<u64>,
    /// Rounded attention percentage; `None` until a frame is classified
    pub attention_pct: Option<u8>,
    pub attention_level: Option<AttentionLevel>,
    /// Calibration samples collected so far, while calibrating
    pub calibration_samples: Option<usize>,
    /// Report returned by the collector at close, if any
    pub report: Option<String>,
}

/// Format elapsed seconds as `MM:SS` for display.
pub fn format_elapsed(elapsed_secs: u64) -> String {
    format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}
