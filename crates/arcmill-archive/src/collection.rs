//! Thread-safe hand-off of adaptation outcomes from the broker listener to the consumer.
//!
//! # Design
//! - Many producers, one consumer. Producers never block; the consumer waits on a
//!   [`Notify`] permit so a wake-up issued before it starts waiting is not lost.
//! - Only registered ids are accepted, each at most once, so successful adds can never
//!   exceed the number of dispatched requests.
//! - Completion is reached either when the collection is sealed and every registered id
//!   has an outcome, or when it is forced. It is never reset.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use arcmill_events::{AdaptationOutcome, CorrelationId};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::OutcomeError;

#[derive(Debug, Default)]
struct CollectionState {
    pending: VecDeque<(CorrelationId, AdaptationOutcome)>,
    expected: HashSet<CorrelationId>,
    received: HashSet<CorrelationId>,
    sealed: bool,
    completed: bool,
}

impl CollectionState {
    fn complete_if_settled(&mut self) {
        if self.sealed && self.received.len() == self.expected.len() {
            self.completed = true;
        }
    }
}

/// Pending outcomes for one archive job.
#[derive(Debug, Default)]
pub struct OutcomeCollection {
    state: Mutex<CollectionState>,
    ready: Notify,
}

impl OutcomeCollection {
    /// Create an empty, open collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that an outcome is expected for `file_id`.
    ///
    /// # Errors
    ///
    /// Fails when the collection is completed or sealed, or the id is already registered.
    pub fn register(&self, file_id: CorrelationId) -> Result<(), OutcomeError> {
        let mut state = self.lock();
        if state.completed {
            return Err(OutcomeError::Completed { file_id });
        }
        if state.sealed {
            return Err(OutcomeError::Sealed { file_id });
        }
        if !state.expected.insert(file_id) {
            return Err(OutcomeError::Duplicate { file_id });
        }
        Ok(())
    }

    /// Queue the outcome reported for `file_id`.
    ///
    /// # Errors
    ///
    /// Fails when the collection is completed, the id was never registered, or an outcome
    /// for the id was already accepted.
    pub fn add(
        &self,
        file_id: CorrelationId,
        outcome: AdaptationOutcome,
    ) -> Result<(), OutcomeError> {
        {
            let mut state = self.lock();
            if state.completed {
                return Err(OutcomeError::Completed { file_id });
            }
            if !state.expected.contains(&file_id) {
                return Err(OutcomeError::Unexpected { file_id });
            }
            if !state.received.insert(file_id) {
                return Err(OutcomeError::Duplicate { file_id });
            }
            state.pending.push_back((file_id, outcome));
            state.complete_if_settled();
        }
        self.ready.notify_one();
        Ok(())
    }

    /// Stop accepting registrations; completes at once if nothing is outstanding.
    pub fn seal(&self) {
        {
            let mut state = self.lock();
            state.sealed = true;
            state.complete_if_settled();
        }
        self.ready.notify_one();
    }

    /// Force completion. Idempotent.
    pub fn mark_completed(&self) {
        self.lock().completed = true;
        self.ready.notify_one();
    }

    /// Completed and fully drained.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        let state = self.lock();
        state.completed && state.pending.is_empty()
    }

    /// Completed, whether or not entries remain to be taken.
    #[must_use]
    pub fn is_adding_completed(&self) -> bool {
        self.lock().completed
    }

    /// Number of outcomes waiting to be taken.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of registered ids.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.lock().expected.len()
    }

    /// Wait for the next outcome.
    ///
    /// Returns `None` once the collection is completed and drained, or when `cancel`
    /// fires.
    pub async fn try_take(
        &self,
        cancel: &CancellationToken,
    ) -> Option<(CorrelationId, AdaptationOutcome)> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            {
                let mut state = self.lock();
                if let Some(entry) = state.pending.pop_front() {
                    return Some(entry);
                }
                if state.completed {
                    return None;
                }
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                () = self.ready.notified() => {}
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
