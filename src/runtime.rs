//! Cooperative session runtime
//!
//! Drives one [`SessionController`] on a single task: detector frames
//! arrive on a channel, and the three timers that animate a session are
//! multiplexed alongside them with `select!`. Nothing preempts anything
//! mid-step, matching the controller's single-threaded design; on a
//! current-thread runtime the whole session is cooperatively scheduled.
//!
//! - one-shot calibration timer, armed when the first face opens the
//!   calibration window
//! - periodic batch-flush timer, running while the session is active
//! - periodic display tick, snapshotting status for the operator surface
//!
//! Closing the frame channel is the operator's stop command: the runtime
//! completes the end-of-session sequence (final flush, close call)
//! before returning the controller for inspection.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::collector::Collector;
use crate::detector::DetectionEvent;
use crate::session::{frame_event, SessionController, SessionEvent, SessionPhase};
use crate::storage::QueueStorage;
use crate::types::SessionStatus;

/// Display tick period
const DISPLAY_TICK: Duration = Duration::from_secs(1);

/// Runs a session controller against a frame stream and real timers.
pub struct SessionRuntime<C: Collector, S: QueueStorage> {
    controller: SessionController<C, S>,
}

impl<C: Collector, S: QueueStorage> SessionRuntime<C, S> {
    pub fn new(controller: SessionController<C, S>) -> Self {
        Self { controller }
    }

    /// Run the session to completion.
    ///
    /// Starts the session, consumes `frames` until the channel closes,
    /// then performs the end sequence and returns the controller. When
    /// `status_tx` is given, a [`SessionStatus`] snapshot is sent every
    /// display tick (dropped, not awaited, if the receiver lags).
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<DetectionEvent>,
        status_tx: Option<mpsc::Sender<SessionStatus>>,
    ) -> SessionController<C, S> {
        self.controller.handle(SessionEvent::Start).await;

        let calibration_window = self.controller.config().calibration_duration();
        let batch_interval = self.controller.config().batch_interval();

        // Parked until the first face arms it.
        let calibration = time::sleep(Duration::from_secs(86_400));
        tokio::pin!(calibration);
        let mut calibration_armed = false;

        let mut flush = time::interval(batch_interval);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut display = time::interval(DISPLAY_TICK);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let active = self.controller.phase() == SessionPhase::Active;
            tokio::select! {
                received = frames.recv() => {
                    match received {
                        Some(event) => {
                            let timestamp_ms = event.timestamp_ms;
                            let before = self.controller.phase();
                            self.controller
                                .handle(frame_event(event.into_detection(), timestamp_ms))
                                .await;
                            if before == SessionPhase::AwaitingFace
                                && self.controller.phase() == SessionPhase::Calibrating
                            {
                                calibration
                                    .as_mut()
                                    .reset(Instant::now() + calibration_window);
                                calibration_armed = true;
                                debug!(window_ms = calibration_window.as_millis() as u64, "calibration timer armed");
                            }
                        }
                        None => {
                            // Frame source closed: operator stop.
                            self.controller.handle(SessionEvent::Stop).await;
                            break;
                        }
                    }
                }
                _ = &mut calibration, if calibration_armed => {
                    calibration_armed = false;
                    self.controller.handle(SessionEvent::CalibrationElapsed).await;
                    // Flush cadence starts at activation.
                    flush.reset();
                }
                _ = flush.tick(), if active => {
                    self.controller.handle(SessionEvent::FlushTick).await;
                }
                _ = display.tick() => {
                    if let Some(tx) = &status_tx {
                        let _ = tx.try_send(self.controller.status());
                    }
                }
            }

            if self.controller.phase() == SessionPhase::Ended {
                break;
            }
        }

        self.controller
    }
}
