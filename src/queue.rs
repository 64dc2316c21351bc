//! Durable retry queue
//!
//! Ordered batches awaiting redelivery, mirrored into durable storage
//! after every mutation so undelivered telemetry survives process
//! restarts. Storage problems degrade to an empty queue and a warning;
//! they never block a session. The queue is best-effort local state,
//! not a ledger.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::QUEUE_STORAGE_KEY;
use crate::storage::QueueStorage;
use crate::types::Batch;

/// Persistent FIFO of undelivered batches.
pub struct RetryQueue<S: QueueStorage> {
    entries: VecDeque<Batch>,
    storage: S,
    key: &'static str,
}

impl<S: QueueStorage> RetryQueue<S> {
    pub fn new(storage: S) -> Self {
        Self {
            entries: VecDeque::new(),
            storage,
            key: QUEUE_STORAGE_KEY,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the in-memory queue with the persisted copy.
    ///
    /// Absent, unreadable, or unparsable stored values all start the
    /// session from an empty queue; the parse error is logged, not
    /// propagated.
    pub fn load(&mut self) {
        let stored = match self.storage.get(self.key) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "retry queue storage unreadable, starting empty");
                self.entries.clear();
                return;
            }
        };
        match stored {
            None => {
                self.entries.clear();
            }
            Some(json) => match serde_json::from_str::<Vec<Batch>>(&json) {
                Ok(batches) => {
                    debug!(batches = batches.len(), "loaded pending batches from storage");
                    self.entries = batches.into();
                }
                Err(e) => {
                    warn!(error = %e, "persisted retry queue corrupt, starting empty");
                    self.entries.clear();
                }
            },
        }
    }

    /// Append a batch that failed delivery and persist the queue.
    pub fn push(&mut self, batch: Batch) {
        self.entries.push_back(batch);
        self.persist();
    }

    /// Snapshot the queue for a drain attempt: returns every queued
    /// batch in order and persists the now-empty queue. Batches that
    /// still fail delivery come back via [`push`](Self::push), behind
    /// anything enqueued meanwhile.
    pub fn take_all(&mut self) -> Vec<Batch> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        let snapshot: Vec<Batch> = self.entries.drain(..).collect();
        self.persist();
        snapshot
    }

    /// Empty the queue and remove the persisted copy. Only called from
    /// the session-close success path.
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.storage.remove(self.key) {
            warn!(error = %e, "failed to remove persisted retry queue");
        }
    }

    /// Mirror the in-memory queue into storage; failure degrades to a
    /// warning so an unwritable disk cannot take the session down.
    fn persist(&self) {
        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize retry queue");
                return;
            }
        };
        if let Err(e) = self.storage.set(self.key, &json) {
            warn!(error = %e, "failed to persist retry queue");
        }
    }
}
