//! Publishes one adaptation request per extracted file.

use std::path::Path;
use std::sync::Arc;

use arcmill_events::{AdaptationRequest, CorrelationId, MessageId, RequestPublisher};
use arcmill_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::collection::OutcomeCollection;
use crate::error::{ArchiveError, ArchiveResult};

/// Result of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The transport accepted the request. Says nothing about the eventual outcome.
    Accepted {
        /// Id assigned by the transport.
        message_id: MessageId,
    },
    /// The job was cancelled before the request was accepted.
    Cancelled,
}

/// Sends adaptation requests and registers their correlation ids as expected.
#[derive(Clone)]
pub struct RequestDispatcher {
    publisher: Arc<dyn RequestPublisher>,
    collection: Arc<OutcomeCollection>,
    reply_to: String,
    metrics: Metrics,
}

impl RequestDispatcher {
    /// Create a dispatcher replying to `reply_to`.
    #[must_use]
    pub fn new(
        publisher: Arc<dyn RequestPublisher>,
        collection: Arc<OutcomeCollection>,
        reply_to: impl Into<String>,
        metrics: Metrics,
    ) -> Self {
        Self {
            publisher,
            collection,
            reply_to: reply_to.into(),
            metrics,
        }
    }

    /// Ask a worker to adapt `source` into `destination`.
    ///
    /// The id is registered with the outcome collection before publishing, so a reply
    /// racing ahead of this call's return is still accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Collection`] if the id cannot be registered and
    /// [`ArchiveError::Dispatch`] if the transport refuses the request.
    pub async fn send(
        &self,
        file_id: CorrelationId,
        source: &Path,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> ArchiveResult<DispatchStatus> {
        if cancel.is_cancelled() {
            return Ok(DispatchStatus::Cancelled);
        }

        self.collection.register(file_id)?;
        let request = AdaptationRequest {
            file_id,
            source_path: source.to_string_lossy().into_owned(),
            destination_path: destination.to_string_lossy().into_owned(),
            reply_to: self.reply_to.clone(),
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(DispatchStatus::Cancelled),
            published = self.publisher.publish_request(request) => match published {
                Ok(message_id) => {
                    self.metrics.inc_file_dispatched();
                    debug!(%file_id, message_id, "adaptation request published");
                    Ok(DispatchStatus::Accepted { message_id })
                }
                Err(source) => Err(ArchiveError::Dispatch { file_id, source }),
            },
        }
    }
}
