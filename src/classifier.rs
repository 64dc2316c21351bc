//! Gaze classification
//!
//! Classifies one feature frame as attentive or looking away from the
//! baseline-adjusted yaw deviation. Every frame is classified
//! independently; no smoothing or hysteresis, so values near the
//! threshold flicker frame to frame. That flicker is the contract, and
//! smoothing belongs to consumers that want it.

use crate::types::FeatureFrame;

/// Horizontal offset of the nose tip from the midpoint between the ears,
/// in normalized x units. Proxy for head-turn angle.
pub fn yaw_deviation(frame: &FeatureFrame) -> f64 {
    let ears_midpoint_x = (frame.left_ear.x + frame.right_ear.x) / 2.0;
    frame.nose_tip.x - ears_midpoint_x
}

/// Stateless classifier holding the threshold configuration.
#[derive(Debug, Clone, Copy)]
pub struct GazeClassifier {
    yaw_threshold: f64,
}

impl GazeClassifier {
    pub fn new(yaw_threshold: f64) -> Self {
        Self { yaw_threshold }
    }

    /// True when the baseline-adjusted yaw deviation exceeds the
    /// threshold.
    pub fn is_looking_away(&self, frame: &FeatureFrame, baseline_yaw: f64) -> bool {
        (yaw_deviation(frame) - baseline_yaw).abs() > self.yaw_threshold
    }
}
