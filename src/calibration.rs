//! Calibration engine
//!
//! Learns a per-user baseline yaw so classification is centered on
//! "looking at this camera" rather than an absolute frontal pose. While
//! the calibration window is open, every processed frame contributes one
//! yaw-deviation sample; when the window closes the baseline is the
//! arithmetic mean of the samples. The sample list is discarded after
//! the baseline is computed.

use tracing::{info, warn};

use crate::classifier::yaw_deviation;
use crate::types::FeatureFrame;

/// Outcome of one calibration window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    /// Baseline yaw to use for the session
    pub baseline_yaw: f64,
    /// Samples the window collected; zero means the window underran and
    /// the prior baseline was kept
    pub samples: usize,
}

/// Collects yaw-deviation samples during the calibration window.
#[derive(Debug, Default)]
pub struct Calibrator {
    samples: Vec<f64>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any stale samples before a new window opens.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Record one frame's yaw deviation.
    pub fn record(&mut self, frame: &FeatureFrame) {
        self.samples.push(yaw_deviation(frame));
    }

    /// Samples collected so far, for calibration-progress display.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Close the window and compute the session baseline.
    ///
    /// Empty window (face lost for the whole duration) keeps
    /// `prior_baseline`; the session proceeds uncalibrated rather than
    /// failing. The two cases are distinguishable in logs and in the
    /// returned sample count.
    pub fn finish(&mut self, prior_baseline: f64) -> CalibrationOutcome {
        let samples = self.samples.len();
        let baseline_yaw = if samples > 0 {
            let mean = self.samples.iter().sum::<f64>() / samples as f64;
            info!(samples, baseline_yaw = mean, "calibration complete");
            mean
        } else {
            warn!(
                prior_baseline,
                "calibration window closed with no samples, keeping prior baseline"
            );
            prior_baseline
        };
        self.samples.clear();
        CalibrationOutcome {
            baseline_yaw,
            samples,
        }
    }
}
