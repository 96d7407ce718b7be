//! In-process message bus used as the broker transport.

use crate::error::{BusError, BusResult};
use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Message, MessageEnvelope, MessageId};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Shared message bus fanning every message out to per-subscriber queues.
///
/// Each subscriber owns an unbounded queue, so a subscriber that falls behind
/// receives every message late rather than losing any. Recently published
/// envelopes are also kept in a bounded replay ring so that a subscriber
/// attaching late can catch up from a known message id. When the ring
/// overflows the oldest envelope is dropped from the ring only.
#[derive(Clone)]
pub struct MessageBus {
    state: Arc<Mutex<BusState>>,
    replay_capacity: usize,
}

struct BusState {
    next_id: MessageId,
    replay: VecDeque<MessageEnvelope>,
    subscribers: Vec<UnboundedSender<MessageEnvelope>>,
}

impl MessageBus {
    /// Construct a bus with a custom replay capacity.
    ///
    /// # Panics
    ///
    /// Panics if `replay_capacity` is zero.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        assert!(replay_capacity > 0, "message bus capacity must be positive");
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_id: 1,
                replay: VecDeque::with_capacity(replay_capacity),
                subscribers: Vec::new(),
            })),
            replay_capacity,
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Publish a message to every current subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NoSubscribers`] when nobody is attached to receive
    /// the message; the message is not retained for replay in that case.
    pub fn publish(&self, message: Message) -> BusResult<MessageId> {
        let message_kind = message.kind();
        let mut state = self.lock_state();
        let id = state.next_id;
        state.next_id += 1;
        let envelope = MessageEnvelope {
            id,
            timestamp: Utc::now(),
            message,
        };

        state
            .subscribers
            .retain(|subscriber| subscriber.send(envelope.clone()).is_ok());
        if state.subscribers.is_empty() {
            return Err(BusError::NoSubscribers {
                message_id: id,
                message_kind,
            });
        }
        if state.replay.len() == self.replay_capacity {
            let _ = state.replay.pop_front();
        }
        state.replay.push_back(envelope);
        Ok(id)
    }

    /// Subscribe to the bus, replaying buffered messages newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<MessageId>) -> MessageStream {
        let mut state = self.lock_state();
        let backlog = since_id.map_or_else(VecDeque::new, |since| {
            state
                .replay
                .iter()
                .filter(|env| env.id > since)
                .cloned()
                .collect()
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        state.subscribers.push(sender);
        drop(state);
        MessageStream {
            backlog,
            receiver: UnboundedReceiverStream::new(receiver),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_state()
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.is_closed())
            .count()
    }

    /// Last message id observed in the replay buffer.
    #[must_use]
    pub fn last_message_id(&self) -> Option<MessageId> {
        self.lock_state().replay.back().map(|env| env.id)
    }

    fn lock_state(&self) -> MutexGuard<'_, BusState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields messages either from the replay backlog or from
/// the subscriber's live queue.
pub struct MessageStream {
    backlog: VecDeque<MessageEnvelope>,
    receiver: UnboundedReceiverStream<MessageEnvelope>,
}

impl MessageStream {
    /// Receive the next message, draining the replay backlog first.
    ///
    /// `None` is returned once every handle to the bus has been dropped and the
    /// queue is empty.
    pub async fn next(&mut self) -> Option<MessageEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }
        self.receiver.next().await
    }
}
