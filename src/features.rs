//! Per-frame feature extraction
//!
//! Maps one detected landmark set to the compact [`FeatureFrame`] record
//! the collector consumes. Pure: no state, no side effects. The detector
//! contract guarantees all indices are present when a face is reported,
//! so a missing index is an invariant violation surfaced as an error and
//! skipped upstream rather than a panic.

use crate::detector::{landmark_index as idx, LandmarkPoint};
use crate::error::TelemetryError;
use crate::types::FeatureFrame;

/// Extractor for the seven consumed landmarks.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Copy the consumed landmarks out of a transient detector frame.
    pub fn extract(landmarks: &[LandmarkPoint], timestamp: i64) -> Result<FeatureFrame, TelemetryError> {
        Ok(FeatureFrame {
            timestamp,
            nose_tip: point_at(landmarks, idx::NOSE_TIP)?,
            left_ear: point_at(landmarks, idx::LEFT_EAR)?,
            right_ear: point_at(landmarks, idx::RIGHT_EAR)?,
            mouth_left: point_at(landmarks, idx::MOUTH_LEFT)?,
            mouth_right: point_at(landmarks, idx::MOUTH_RIGHT)?,
            chin: point_at(landmarks, idx::CHIN)?,
            forehead: point_at(landmarks, idx::FOREHEAD)?,
        })
    }
}

fn point_at(landmarks: &[LandmarkPoint], index: usize) -> Result<LandmarkPoint, TelemetryError> {
    landmarks
        .get(index)
        .copied()
        .ok_or(TelemetryError::MissingLandmark(index))
}
