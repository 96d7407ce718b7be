//! Feeds worker replies from the message bus into an [`OutcomeCollection`].

use std::sync::Arc;

use arcmill_events::{Message, MessageStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::collection::OutcomeCollection;

/// Background task forwarding `AdaptationCompleted` messages.
pub struct ResponseListener {
    handle: JoinHandle<usize>,
}

impl ResponseListener {
    /// Spawn the listener on `stream`. Subscribe before the first request is dispatched.
    #[must_use]
    pub fn spawn(
        stream: MessageStream,
        collection: Arc<OutcomeCollection>,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(listen(stream, collection, cancel));
        Self { handle }
    }

    /// Wait for the listener to stop and return how many outcomes it delivered.
    ///
    /// A panicked listener reports zero deliveries.
    pub async fn join(self) -> usize {
        self.handle.await.unwrap_or_default()
    }
}

async fn listen(
    mut stream: MessageStream,
    collection: Arc<OutcomeCollection>,
    cancel: CancellationToken,
) -> usize {
    let mut delivered = 0;
    loop {
        let envelope = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = stream.next() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let Message::AdaptationCompleted { file_id, outcome } = envelope.message else {
            trace!(message_id = envelope.id, "ignoring non-reply message");
            continue;
        };
        match collection.add(file_id, outcome) {
            Ok(()) => delivered += 1,
            Err(err) => debug!(%file_id, error = %err, "reply rejected by outcome collection"),
        }
        if collection.is_adding_completed() {
            break;
        }
    }
    debug!(delivered, "response listener stopped");
    delivered
}
