//! Passthrough worker answering adaptation requests on the in-process bus.
//!
//! Every request is answered `Unmodified`, so the rebuilt archive mirrors the input.
//! Used when no external adaptation service is attached.

use arcmill_events::{AdaptationOutcome, Message, MessageBus, completion};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running passthrough worker.
pub struct LocalWorker {
    handle: JoinHandle<usize>,
    cancel: CancellationToken,
}

impl LocalWorker {
    /// Subscribe to `bus` and start answering requests.
    #[must_use]
    pub fn spawn(bus: &MessageBus) -> Self {
        let mut stream = bus.subscribe(None);
        let bus = bus.clone();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut answered = 0;
            loop {
                let envelope = tokio::select! {
                    () = stop.cancelled() => break,
                    next = stream.next() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };
                let Message::AdaptationRequested { file_id, .. } = envelope.message else {
                    continue;
                };
                match bus.publish(completion(file_id, AdaptationOutcome::Unmodified)) {
                    Ok(_) => answered += 1,
                    Err(err) => warn!(%file_id, error = %err, "failed to answer adaptation request"),
                }
            }
            debug!(answered, "local worker stopped");
            answered
        });
        Self { handle, cancel }
    }

    /// Stop the worker and return how many requests it answered.
    pub async fn stop(self) -> usize {
        self.cancel.cancel();
        self.handle.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcmill_events::{AdaptationRequest, CorrelationId, RequestPublisher};
    use std::error::Error;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn answers_requests_with_unmodified() -> Result<(), Box<dyn Error>> {
        let bus = MessageBus::new();
        let mut replies = bus.subscribe(None);
        let worker = LocalWorker::spawn(&bus);
        let file_id = CorrelationId::from_u128(7);

        bus.publish_request(AdaptationRequest {
            file_id,
            source_path: "/in/a".into(),
            destination_path: "/out/a".into(),
            reply_to: "replies".into(),
        })
        .await?;

        let reply = timeout(Duration::from_secs(1), async {
            while let Some(envelope) = replies.next().await {
                if let Message::AdaptationCompleted { file_id, outcome } = envelope.message {
                    return Some((file_id, outcome));
                }
            }
            None
        })
        .await?;
        assert_eq!(reply, Some((file_id, AdaptationOutcome::Unmodified)));
        assert_eq!(worker.stop().await, 1);
        Ok(())
    }
}
