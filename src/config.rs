//! Session configuration
//!
//! All tunables for a session in one serde-loadable struct. Defaults carry
//! the calibrated production values; the CLI overrides individual fields
//! from flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Yaw deviation (normalized x units) beyond which a frame counts as
/// looking away.
pub const DEFAULT_YAW_THRESHOLD: f64 = 0.08;

/// Calibration sampling window in milliseconds.
pub const DEFAULT_CALIBRATION_MS: u64 = 5000;

/// Periodic batch-flush interval in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 1000;

/// Storage key under which the retry queue is persisted.
pub const QUEUE_STORAGE_KEY: &str = "pending_queue";

/// Configuration for one telemetry session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Collector base URL, e.g. `http://localhost:8000/api`
    pub collector_url: String,
    /// Threshold on baseline-adjusted yaw deviation for "looking away"
    pub yaw_threshold: f64,
    /// Calibration window duration (ms)
    pub calibration_ms: u64,
    /// Batch flush interval (ms)
    pub batch_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            collector_url: "http://localhost:8000/api".to_string(),
            yaw_threshold: DEFAULT_YAW_THRESHOLD,
            calibration_ms: DEFAULT_CALIBRATION_MS,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
        }
    }
}

impl SessionConfig {
    /// Calibration window as a [`Duration`]
    pub fn calibration_duration(&self) -> Duration {
        Duration::from_millis(self.calibration_ms)
    }

    /// Flush interval as a [`Duration`]
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}
