//! Error types for Gazemeter

use thiserror::Error;

/// Errors that can occur while running a session
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to parse detection payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Landmark frame missing index {0}")]
    MissingLandmark(usize),

    #[error("Landmark frame has {got} points, expected {expected}")]
    TruncatedFrame { got: usize, expected: usize },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Batch delivery failed: {0}")]
    DeliveryError(String),

    #[error("Collector rejected request with status {0}")]
    CollectorStatus(u16),

    #[error("Session close failed: {0}")]
    SessionCloseError(String),
}
