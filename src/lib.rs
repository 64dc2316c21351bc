//! Gazemeter - session controller for facial-landmark attention telemetry
//!
//! Gazemeter turns a stream of per-frame facial landmark detections into
//! a reliable behavioral telemetry feed: it learns a per-user gaze
//! baseline through a timed calibration window, classifies every frame
//! as attentive or looking away against that baseline, batches extracted
//! per-frame features on a flush timer, and guarantees eventual delivery
//! to a remote collector through a retry queue persisted across process
//! restarts.
//!
//! ## Modules
//!
//! - **Session**: the `Idle → AwaitingFace → Calibrating → Active →
//!   Ended` state machine and its controller
//! - **Runtime**: cooperative single-task driver wiring detector frames
//!   and timers into the session

pub mod batcher;
pub mod calibration;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod queue;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod types;

pub use collector::{Collector, HttpCollector};
pub use config::SessionConfig;
pub use detector::{Detection, DetectionEvent, LandmarkPoint};
pub use error::TelemetryError;
pub use runtime::SessionRuntime;
pub use session::{transition, Action, SessionController, SessionEvent, SessionPhase};
pub use types::{Batch, DeliveryStatus, FeatureFrame, SessionStatus};

/// Gazemeter version embedded in logs and the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for logs and diagnostics
pub const PRODUCER_NAME: &str = "gazemeter";
