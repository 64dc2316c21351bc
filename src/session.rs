//! Session state machine
//!
//! Orchestrates one telemetry session:
//! `Idle → AwaitingFace → Calibrating → Active → Ended`. Incoming
//! detector frames, timer ticks, and operator commands are all explicit
//! [`SessionEvent`]s; [`transition`] is a pure function from
//! `(phase, event)` to `(phase, action)` so the machine is testable
//! without real timers or a real detector, and [`SessionController`]
//! executes the chosen action against its collaborators.
//!
//! No error here escapes the session boundary: delivery and storage
//! failures degrade the status signal, they never crash the controller.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batcher::TelemetryBatcher;
use crate::calibration::Calibrator;
use crate::classifier::GazeClassifier;
use crate::collector::Collector;
use crate::config::SessionConfig;
use crate::detector::Detection;
use crate::features::FeatureExtractor;
use crate::queue::RetryQueue;
use crate::storage::QueueStorage;
use crate::types::{now_millis, AttentionLevel, DeliveryStatus, FeatureFrame, SessionStatus};

/// Lifecycle phase of one session. `Idle` is initial; `Ended` is
/// terminal, a new session restarts at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingFace,
    Calibrating,
    Active,
    Ended,
}

/// Everything that can happen to a session: operator commands, detector
/// frames, and timer ticks.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Operator start command
    Start,
    /// One detector callback payload
    Frame {
        detection: Detection,
        /// Capture time; stamped at processing time when absent
        timestamp_ms: Option<i64>,
    },
    /// The one-shot calibration timer elapsed
    CalibrationElapsed,
    /// The periodic batch-flush timer fired
    FlushTick,
    /// Operator stop command
    Stop,
}

/// The side effect a transition selects; executed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reset counters, load the retry queue, begin frame acquisition
    BeginSession,
    /// First face seen: clear stale samples, open the calibration window
    BeginCalibration,
    /// Record one calibration sample
    CollectSample,
    /// Close the window, compute the baseline, start the active timers
    FinishCalibration,
    /// Classify and buffer one frame
    ProcessFrame,
    /// Periodic flush: drain the retry queue, then send the buffer
    Flush,
    /// Final flush, session-close call, queue clear on success
    EndSession,
}

/// Pure transition function of the session state machine.
///
/// Frames without a face never advance the machine; stale timer events
/// from a previous phase are dropped.
pub fn transition(phase: SessionPhase, event: &SessionEvent) -> (SessionPhase, Option<Action>) {
    use SessionPhase::*;

    match (phase, event) {
        (Idle, SessionEvent::Start) => (AwaitingFace, Some(Action::BeginSession)),

        (AwaitingFace, SessionEvent::Frame { detection, .. }) => match detection {
            Detection::Face(_) => (Calibrating, Some(Action::BeginCalibration)),
            Detection::NoFace => (AwaitingFace, None),
        },

        (Calibrating, SessionEvent::Frame { detection, .. }) => match detection {
            Detection::Face(_) => (Calibrating, Some(Action::CollectSample)),
            Detection::NoFace => (Calibrating, None),
        },
        (Calibrating, SessionEvent::CalibrationElapsed) => {
            (Active, Some(Action::FinishCalibration))
        }

        (Active, SessionEvent::Frame { detection, .. }) => match detection {
            Detection::Face(_) => (Active, Some(Action::ProcessFrame)),
            Detection::NoFace => (Active, None),
        },
        (Active, SessionEvent::FlushTick) => (Active, Some(Action::Flush)),

        // Stop is honored from any running phase; the end sequence is
        // the same whether calibration ever completed.
        (AwaitingFace | Calibrating | Active, SessionEvent::Stop) => {
            (Ended, Some(Action::EndSession))
        }

        // Everything else is a no-op in its phase.
        (phase, _) => (phase, None),
    }
}

/// One session's controller: the state machine plus its collaborators.
///
/// Constructed fresh per session; holds all mutable session state
/// (buffers, counters, baseline) as ordinary fields.
pub struct SessionController<C: Collector, S: QueueStorage> {
    config: SessionConfig,
    phase: SessionPhase,
    session_id: Uuid,
    baseline_yaw: f64,
    classifier: GazeClassifier,
    calibrator: Calibrator,
    batcher: TelemetryBatcher,
    queue: RetryQueue<S>,
    collector: C,
    delivery: DeliveryStatus,
    delivered_batches: u64,
    activated_at: Option<DateTime<Utc>>,
    report: Option<String>,
}

impl<C: Collector, S: QueueStorage> SessionController<C, S> {
    pub fn new(config: SessionConfig, collector: C, storage: S) -> Self {
        let classifier = GazeClassifier::new(config.yaw_threshold);
        Self {
            config,
            phase: SessionPhase::Idle,
            session_id: Uuid::nil(),
            baseline_yaw: 0.0,
            classifier,
            calibrator: Calibrator::new(),
            batcher: TelemetryBatcher::new(),
            queue: RetryQueue::new(storage),
            collector,
            delivery: DeliveryStatus::Idle,
            delivered_batches: 0,
            activated_at: None,
            report: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Baseline yaw currently in effect
    pub fn baseline_yaw(&self) -> f64 {
        self.baseline_yaw
    }

    /// Read-only status snapshot for the operator surface.
    pub fn status(&self) -> SessionStatus {
        let attention_pct = self.batcher.attention_pct();
        SessionStatus {
            delivery: self.delivery,
            delivered_batches: self.delivered_batches,
            queued_batches: self.queue.len(),
            elapsed_secs: self
                .activated_at
                .map(|t| (Utc::now() - t).num_seconds().max(0) as u64),
            attention_pct,
            attention_level: attention_pct.map(AttentionLevel::from_pct),
            calibration_samples: (self.phase == SessionPhase::Calibrating)
                .then(|| self.calibrator.sample_count()),
            report: self.report.clone(),
        }
    }

    /// Deliver one event to the state machine and execute its action.
    pub async fn handle(&mut self, event: SessionEvent) {
        let (next, action) = transition(self.phase, &event);
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, "session phase change");
        }
        self.phase = next;

        let Some(action) = action else { return };
        match action {
            Action::BeginSession => self.begin_session(),
            Action::BeginCalibration => {
                self.begin_calibration(&event);
            }
            Action::CollectSample => {
                if let Some(frame) = self.frame_from(&event) {
                    self.calibrator.record(&frame);
                }
            }
            Action::FinishCalibration => self.finish_calibration(),
            Action::ProcessFrame => {
                if let Some(frame) = self.frame_from(&event) {
                    let attentive = !self.classifier.is_looking_away(&frame, self.baseline_yaw);
                    self.batcher.record(frame, attentive);
                }
            }
            Action::Flush => self.flush().await,
            Action::EndSession => self.end_session().await,
        }
    }

    fn begin_session(&mut self) {
        self.session_id = Uuid::new_v4();
        self.delivered_batches = 0;
        self.baseline_yaw = 0.0;
        self.report = None;
        self.activated_at = None;
        self.batcher.reset();
        self.calibrator.reset();
        // A prior session's undelivered batches become eligible again.
        self.queue.load();
        self.delivery = DeliveryStatus::WaitingForFace;
        info!(session_id = %self.session_id, queued = self.queue.len(), "session started");
    }

    fn begin_calibration(&mut self, event: &SessionEvent) {
        self.calibrator.reset();
        self.delivery = DeliveryStatus::Calibrating;
        info!("face detected, calibration window open");
        // The triggering frame is also the first sample.
        if let Some(frame) = self.frame_from(event) {
            self.calibrator.record(&frame);
        }
    }

    fn finish_calibration(&mut self) {
        let outcome = self.calibrator.finish(self.baseline_yaw);
        self.baseline_yaw = outcome.baseline_yaw;
        self.activated_at = Some(Utc::now());
        self.delivery = DeliveryStatus::Healthy;
    }

    /// Extract the feature frame out of a frame event, stamping it when
    /// the detector supplied no capture time. Contract violations are
    /// logged and the frame is skipped.
    fn frame_from(&self, event: &SessionEvent) -> Option<FeatureFrame> {
        let SessionEvent::Frame {
            detection,
            timestamp_ms,
        } = event
        else {
            return None;
        };
        let landmarks = detection.landmarks()?;
        let timestamp = timestamp_ms.unwrap_or_else(now_millis);
        match FeatureExtractor::extract(landmarks, timestamp) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "skipping frame violating detector contract");
                None
            }
        }
    }

    /// Drain the retry queue, then deliver the freshly detached buffer.
    ///
    /// The buffer is detached before any network call, so frames
    /// arriving during the round-trip land in the next batch.
    async fn flush(&mut self) {
        self.drain_retry_queue().await;

        let Some(batch) = self.batcher.detach(self.session_id) else {
            return;
        };
        match self.collector.ingest(&batch).await {
            Ok(_) => {
                self.delivered_batches += 1;
                if self.phase == SessionPhase::Active {
                    self.delivery = DeliveryStatus::Healthy;
                }
            }
            Err(e) => {
                warn!(error = %e, frames = batch.frames.len(), "delivery failed, queuing batch");
                self.queue.push(batch);
                if self.phase == SessionPhase::Active {
                    self.delivery = DeliveryStatus::Degraded;
                }
            }
        }
    }

    /// Attempt redelivery of every queued batch, oldest first. Batches
    /// that fail again go back to the end of the queue.
    async fn drain_retry_queue(&mut self) {
        let pending = self.queue.take_all();
        if pending.is_empty() {
            return;
        }
        debug!(batches = pending.len(), "draining retry queue");
        for batch in pending {
            match self.collector.ingest(&batch).await {
                Ok(_) => debug!(timestamp = batch.timestamp, "queued batch redelivered"),
                Err(e) => {
                    warn!(error = %e, timestamp = batch.timestamp, "redelivery failed");
                    self.queue.push(batch);
                }
            }
        }
    }

    /// The strict end-of-session sequence: final flush, close call, and
    /// queue clear on a successful close.
    async fn end_session(&mut self) {
        self.delivery = DeliveryStatus::GeneratingReport;
        self.flush().await;

        match self.collector.end_session(now_millis()).await {
            Ok(response) => {
                // Compatibility with the collector's session model: a
                // successful close clears the queue even if the final
                // flush left entries behind. The drop is logged so the
                // loss stays visible.
                if !self.queue.is_empty() {
                    warn!(
                        dropped = self.queue.len(),
                        "clearing undelivered batches after successful close"
                    );
                }
                self.queue.clear();
                self.report = response.report;
                self.delivery = DeliveryStatus::Completed;
                info!(delivered = self.delivered_batches, "session closed");
            }
            Err(e) => {
                warn!(error = %e, "session close failed");
                self.delivery = DeliveryStatus::ReportFailed;
            }
        }
    }
}

/// Frame-event convenience used by the runtime and the CLI.
pub fn frame_event(detection: Detection, timestamp_ms: Option<i64>) -> SessionEvent {
    SessionEvent::Frame {
        detection,
        timestamp_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QUEUE_STORAGE_KEY;
    use crate::detector::{face_with, landmark_index as idx};
    use crate::error::TelemetryError;
    use crate::storage::MemoryStorage;
    use crate::types::{Batch, CloseResponse, IngestResponse};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Collector double with a scripted outcome per ingest call
    /// (exhausted script means success) and a switchable close outcome.
    #[derive(Default)]
    struct ScriptedCollector {
        ingest_script: Mutex<VecDeque<bool>>,
        ingested: Mutex<Vec<Batch>>,
        close_ok: Mutex<bool>,
        closed_at: Mutex<Vec<i64>>,
        report: Option<String>,
    }

    impl ScriptedCollector {
        fn always_ok() -> Self {
            Self {
                close_ok: Mutex::new(true),
                ..Default::default()
            }
        }

        fn script_ingest(&self, outcomes: &[bool]) {
            *self.ingest_script.lock().unwrap() = outcomes.iter().copied().collect();
        }

        fn set_close_ok(&self, ok: bool) {
            *self.close_ok.lock().unwrap() = ok;
        }

        fn ingested_timestamps(&self) -> Vec<i64> {
            self.ingested.lock().unwrap().iter().map(|b| b.timestamp).collect()
        }

        fn ingested_frame_counts(&self) -> Vec<usize> {
            self.ingested
                .lock()
                .unwrap()
                .iter()
                .map(|b| b.frames.len())
                .collect()
        }
    }

    #[async_trait]
    impl Collector for ScriptedCollector {
        async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, TelemetryError> {
            let ok = self.ingest_script.lock().unwrap().pop_front().unwrap_or(true);
            if !ok {
                return Err(TelemetryError::DeliveryError("scripted failure".to_string()));
            }
            self.ingested.lock().unwrap().push(batch.clone());
            Ok(IngestResponse {
                status: Some("ok".to_string()),
                processed: Some(batch.frames.len()),
            })
        }

        async fn end_session(&self, timestamp: i64) -> Result<CloseResponse, TelemetryError> {
            if !*self.close_ok.lock().unwrap() {
                return Err(TelemetryError::SessionCloseError("scripted failure".to_string()));
            }
            self.closed_at.lock().unwrap().push(timestamp);
            Ok(CloseResponse {
                status: Some("finished".to_string()),
                report: self.report.clone(),
            })
        }
    }

    fn controller<'a>(
        collector: &'a ScriptedCollector,
        storage: &'a MemoryStorage,
    ) -> SessionController<&'a ScriptedCollector, &'a MemoryStorage> {
        SessionController::new(SessionConfig::default(), collector, storage)
    }

    fn face_frame(nose_x: f64) -> SessionEvent {
        frame_event(
            face_with(&[
                (idx::NOSE_TIP, nose_x, 0.5, 0.0),
                (idx::LEFT_EAR, 0.25, 0.5, 0.0),
                (idx::RIGHT_EAR, 0.75, 0.5, 0.0),
            ]),
            Some(1_700_000_000_000),
        )
    }

    fn no_face() -> SessionEvent {
        frame_event(Detection::NoFace, None)
    }

    // --- transition() as a pure function ---

    #[test]
    fn test_transition_table() {
        use SessionPhase::*;

        let cases = [
            (Idle, SessionEvent::Start, AwaitingFace, Some(Action::BeginSession)),
            (AwaitingFace, no_face(), AwaitingFace, None),
            (AwaitingFace, face_frame(0.5), Calibrating, Some(Action::BeginCalibration)),
            (Calibrating, face_frame(0.5), Calibrating, Some(Action::CollectSample)),
            (Calibrating, no_face(), Calibrating, None),
            (Calibrating, SessionEvent::CalibrationElapsed, Active, Some(Action::FinishCalibration)),
            (Active, face_frame(0.5), Active, Some(Action::ProcessFrame)),
            (Active, no_face(), Active, None),
            (Active, SessionEvent::FlushTick, Active, Some(Action::Flush)),
            (Active, SessionEvent::Stop, Ended, Some(Action::EndSession)),
            (Calibrating, SessionEvent::Stop, Ended, Some(Action::EndSession)),
            (AwaitingFace, SessionEvent::Stop, Ended, Some(Action::EndSession)),
        ];
        for (phase, event, want_phase, want_action) in cases {
            let (next, action) = transition(phase, &event);
            assert_eq!(next, want_phase, "phase after {:?} in {:?}", event, phase);
            assert_eq!(action, want_action, "action after {:?} in {:?}", event, phase);
        }
    }

    #[test]
    fn test_transition_ignores_stale_and_foreign_events() {
        use SessionPhase::*;

        // Timer events from a phase the session already left.
        assert_eq!(transition(Active, &SessionEvent::CalibrationElapsed), (Active, None));
        assert_eq!(transition(Idle, &SessionEvent::FlushTick), (Idle, None));
        assert_eq!(transition(Ended, &SessionEvent::FlushTick), (Ended, None));
        assert_eq!(transition(Ended, &face_frame(0.5)), (Ended, None));
        assert_eq!(transition(Ended, &SessionEvent::Stop), (Ended, None));
        // Start is only honored from Idle.
        assert_eq!(transition(Active, &SessionEvent::Start), (Active, None));
        assert_eq!(transition(Ended, &SessionEvent::Start), (Ended, None));
    }

    // --- controller lifecycle ---

    #[tokio::test]
    async fn test_full_session_lifecycle() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        assert_eq!(session.phase(), SessionPhase::AwaitingFace);
        assert_eq!(session.status().delivery, DeliveryStatus::WaitingForFace);

        // Frames without a face do not start calibration.
        session.handle(no_face()).await;
        assert_eq!(session.phase(), SessionPhase::AwaitingFace);

        // First face opens the window and contributes the first sample.
        session.handle(face_frame(0.52)).await;
        assert_eq!(session.phase(), SessionPhase::Calibrating);
        assert_eq!(session.status().calibration_samples, Some(1));

        session.handle(face_frame(0.50)).await;
        session.handle(no_face()).await; // lost face: not a sample
        assert_eq!(session.status().calibration_samples, Some(2));

        session.handle(SessionEvent::CalibrationElapsed).await;
        assert_eq!(session.phase(), SessionPhase::Active);
        assert!((session.baseline_yaw() - 0.01).abs() < 1e-9);
        assert_eq!(session.status().delivery, DeliveryStatus::Healthy);

        // Attentive at the calibrated pose, away past the threshold.
        session.handle(face_frame(0.52)).await;
        session.handle(face_frame(0.62)).await;
        let status = session.status();
        assert_eq!(status.attention_pct, Some(50));

        session.handle(SessionEvent::FlushTick).await;
        assert_eq!(session.status().delivered_batches, 1);
        assert_eq!(collector.ingested_frame_counts(), vec![2]);

        session.handle(SessionEvent::Stop).await;
        assert_eq!(session.phase(), SessionPhase::Ended);
        let status = session.status();
        assert_eq!(status.delivery, DeliveryStatus::Completed);
        assert_eq!(status.queued_batches, 0);
        assert_eq!(collector.closed_at.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_triggering_frame_is_first_calibration_sample() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.6)).await; // opens window, one sample
        session.handle(SessionEvent::CalibrationElapsed).await;

        assert!((session.baseline_yaw() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_calibration_window_after_face_loss() {
        // Face triggers the window, then the calibrator is reset by a
        // no-sample window: finish() must keep the prior baseline. The
        // single triggering sample makes the window non-empty, so clear
        // it through the public seam: a window where extraction fails.
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        // A face report violating the landmark contract is skipped and
        // contributes no sample, leaving the window empty.
        session
            .handle(frame_event(
                Detection::Face(vec![Default::default(); 10]),
                None,
            ))
            .await;
        assert_eq!(session.phase(), SessionPhase::Calibrating);
        assert_eq!(session.status().calibration_samples, Some(0));

        session.handle(SessionEvent::CalibrationElapsed).await;
        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.baseline_yaw(), 0.0);
    }

    #[tokio::test]
    async fn test_no_face_frames_are_not_classified() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;

        session.handle(face_frame(0.5)).await;
        session.handle(no_face()).await;
        session.handle(no_face()).await;

        assert_eq!(session.status().attention_pct, Some(100));
        session.handle(SessionEvent::FlushTick).await;
        assert_eq!(collector.ingested_frame_counts(), vec![1]);
    }

    #[tokio::test]
    async fn test_delivery_failure_queues_and_degrades() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;
        session.handle(face_frame(0.5)).await;

        collector.script_ingest(&[false]);
        session.handle(SessionEvent::FlushTick).await;

        let status = session.status();
        assert_eq!(status.delivery, DeliveryStatus::Degraded);
        assert_eq!(status.delivered_batches, 0);
        assert_eq!(status.queued_batches, 1);

        // The failed batch is on disk, not just in memory.
        let stored = storage.get(QUEUE_STORAGE_KEY).unwrap().unwrap();
        let persisted: Vec<Batch> = serde_json::from_str(&stored).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].frames.len(), 1);
    }

    #[tokio::test]
    async fn test_flush_drains_queue_before_fresh_batch() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;

        // First flush fails and queues one batch.
        session.handle(face_frame(0.5)).await;
        collector.script_ingest(&[false]);
        session.handle(SessionEvent::FlushTick).await;
        assert_eq!(session.status().queued_batches, 1);
        let queued_ts = {
            let stored = storage.get(QUEUE_STORAGE_KEY).unwrap().unwrap();
            let persisted: Vec<Batch> = serde_json::from_str(&stored).unwrap();
            persisted[0].timestamp
        };

        // Network recovers; the next flush sends the queued batch first.
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::FlushTick).await;

        let delivered = collector.ingested_timestamps();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0], queued_ts);
        assert!(delivered[1] >= delivered[0]);
        assert_eq!(session.status().queued_batches, 0);
        // Redeliveries do not count toward the delivered-batch display.
        assert_eq!(session.status().delivered_batches, 1);
        assert_eq!(session.status().delivery, DeliveryStatus::Healthy);
    }

    #[tokio::test]
    async fn test_prior_session_queue_loads_on_start() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let stale = Batch {
            frames: Vec::new(),
            timestamp: 42,
            session_id: None,
        };
        storage.seed(
            QUEUE_STORAGE_KEY,
            &serde_json::to_string(&vec![stale]).unwrap(),
        );

        let mut session = controller(&collector, &storage);
        session.handle(SessionEvent::Start).await;
        assert_eq!(session.status().queued_batches, 1);

        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::FlushTick).await;

        // The restored batch went out before the fresh one.
        let delivered = collector.ingested_timestamps();
        assert_eq!(delivered[0], 42);
        assert_eq!(delivered.len(), 2);
    }

    #[tokio::test]
    async fn test_close_failure_reports_failed_but_session_ends() {
        let collector = ScriptedCollector::always_ok();
        collector.set_close_ok(false);
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;
        session.handle(face_frame(0.5)).await;

        // Final flush fails too: the batch must survive in the queue
        // because the close never succeeded.
        collector.script_ingest(&[false]);
        session.handle(SessionEvent::Stop).await;

        assert_eq!(session.phase(), SessionPhase::Ended);
        let status = session.status();
        assert_eq!(status.delivery, DeliveryStatus::ReportFailed);
        assert_eq!(status.queued_batches, 1);
        let stored = storage.get(QUEUE_STORAGE_KEY).unwrap();
        assert!(stored.is_some());

        // Once ended, further events are inert.
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::FlushTick).await;
        assert_eq!(session.phase(), SessionPhase::Ended);
        assert_eq!(collector.ingested_frame_counts().len(), 0);
    }

    #[tokio::test]
    async fn test_successful_close_clears_queue_even_when_nonempty() {
        // The documented policy caveat: a batch that fails during the
        // final flush is discarded when the close succeeds.
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;
        session.handle(face_frame(0.5)).await;

        collector.script_ingest(&[false]); // final flush fails
        session.handle(SessionEvent::Stop).await;

        let status = session.status();
        assert_eq!(status.delivery, DeliveryStatus::Completed);
        assert_eq!(status.queued_batches, 0);
        assert_eq!(storage.get(QUEUE_STORAGE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_close_report_is_surfaced_verbatim() {
        let mut collector = ScriptedCollector::always_ok();
        collector.report = Some("Attention held for 82% of the session.".to_string());
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(SessionEvent::Stop).await;

        assert_eq!(
            session.status().report.as_deref(),
            Some("Attention held for 82% of the session.")
        );
    }

    #[tokio::test]
    async fn test_empty_buffer_flush_sends_nothing() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();
        let mut session = controller(&collector, &storage);

        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;

        session.handle(SessionEvent::FlushTick).await;
        session.handle(SessionEvent::FlushTick).await;
        assert!(collector.ingested_frame_counts().is_empty());
        assert_eq!(session.status().delivered_batches, 0);
    }

    #[tokio::test]
    async fn test_counters_reset_between_sessions() {
        let collector = ScriptedCollector::always_ok();
        let storage = MemoryStorage::new();

        let mut session = controller(&collector, &storage);
        session.handle(SessionEvent::Start).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::CalibrationElapsed).await;
        session.handle(face_frame(0.5)).await;
        session.handle(SessionEvent::FlushTick).await;
        session.handle(SessionEvent::Stop).await;
        assert_eq!(session.status().delivered_batches, 1);

        // A new controller value is constructed per session.
        let mut session = controller(&collector, &storage);
        session.handle(SessionEvent::Start).await;
        let status = session.status();
        assert_eq!(status.delivered_batches, 0);
        assert_eq!(status.attention_pct, None);
        assert_eq!(status.elapsed_secs, None);
    }
}
