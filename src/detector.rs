//! Landmark detector contract
//!
//! Gazemeter consumes the output of an external face-landmark detector:
//! per video frame, either "no face" or one face's set of 468 normalized
//! 3D landmark points. Detection itself (camera capture, inference,
//! confidence thresholds) is owned by the detector and opaque to this
//! crate; only the payload contract lives here.

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Number of landmark points in one detected face
pub const LANDMARK_COUNT: usize = 468;

/// FaceMesh indices of the seven landmarks Gazemeter consumes
pub mod landmark_index {
    pub const NOSE_TIP: usize = 1;
    pub const FOREHEAD: usize = 10;
    pub const MOUTH_LEFT: usize = 61;
    pub const CHIN: usize = 152;
    pub const LEFT_EAR: usize = 234;
    pub const MOUTH_RIGHT: usize = 291;
    pub const RIGHT_EAR: usize = 454;
}

/// One landmark point in normalized camera space.
///
/// `x` and `y` are roughly 0..1 across the frame; `z` is depth relative
/// to the face plane. Unitless.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One detector callback payload: either no face, or one face's
/// full landmark set.
///
/// The landmark buffer is owned by the detector for the duration of a
/// single callback; consumers copy out what they need and must not hold
/// references past the call.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// No face in this video frame
    NoFace,
    /// One detected face's landmark points, indexed 0..467
    Face(Vec<LandmarkPoint>),
}

impl Detection {
    /// Landmark slice if a face was detected
    pub fn landmarks(&self) -> Option<&[LandmarkPoint]> {
        match self {
            Detection::NoFace => None,
            Detection::Face(landmarks) => Some(landmarks),
        }
    }

    /// Validate the payload against the detector contract.
    ///
    /// A face report must carry the full landmark set; every consumed
    /// index falls below [`LANDMARK_COUNT`].
    pub fn validate(&self) -> Result<(), TelemetryError> {
        match self {
            Detection::NoFace => Ok(()),
            Detection::Face(landmarks) => {
                if landmarks.len() < LANDMARK_COUNT {
                    return Err(TelemetryError::TruncatedFrame {
                        got: landmarks.len(),
                        expected: LANDMARK_COUNT,
                    });
                }
                Ok(())
            }
        }
    }
}

/// A timestamped detector payload as it appears on the wire.
///
/// `landmarks` absent or `null` means no face was detected in the frame.
/// `timestamp_ms` is the detector's capture time in integer milliseconds
/// since the Unix epoch; when missing, the session stamps the frame at
/// processing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<LandmarkPoint>>,
}

impl DetectionEvent {
    /// Interpret the wire payload as a [`Detection`]
    pub fn into_detection(self) -> Detection {
        match self.landmarks {
            Some(landmarks) => Detection::Face(landmarks),
            None => Detection::NoFace,
        }
    }
}

/// Parse a newline-delimited stream of detection events.
///
/// Blank lines are skipped. The first malformed line aborts the parse;
/// callers that want per-line reporting should parse line by line with
/// [`parse_event`].
pub fn parse_ndjson(input: &str) -> Result<Vec<DetectionEvent>, TelemetryError> {
    let mut events = Vec::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        events.push(parse_event(trimmed)?);
    }
    Ok(events)
}

/// Parse a single detection event from JSON.
pub fn parse_event(json: &str) -> Result<DetectionEvent, TelemetryError> {
    serde_json::from_str(json)
        .map_err(|e| TelemetryError::ParseError(format!("bad detection event: {}", e)))
}

#[cfg(test)]
pub(crate) fn face_with(points: &[(usize, f64, f64, f64)]) -> Detection {
    let mut landmarks = vec![LandmarkPoint::default(); LANDMARK_COUNT];
    for &(idx, x, y, z) in points {
        landmarks[idx] = LandmarkPoint { x, y, z };
    }
    Detection::Face(landmarks)
}
