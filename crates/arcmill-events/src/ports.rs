//! Broker-facing seams used by archive processing.
//!
//! # Design
//! - Processing code publishes through these traits so a real broker client, the
//!   in-process [`MessageBus`], or a test fake can sit behind them.
//! - A successful publish means the transport accepted the message, nothing more.

use async_trait::async_trait;

use crate::error::BusResult;
use crate::payloads::{AdaptationOutcome, CorrelationId, FileOutcome, Message, MessageId};
use crate::routing::MessageBus;

/// Request asking a worker to adapt one extracted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptationRequest {
    /// Correlation id the worker must echo back.
    pub file_id: CorrelationId,
    /// Path of the original file.
    pub source_path: String,
    /// Path the worker writes the rebuilt file to.
    pub destination_path: String,
    /// Address replies are routed to.
    pub reply_to: String,
}

impl From<AdaptationRequest> for Message {
    fn from(request: AdaptationRequest) -> Self {
        Self::AdaptationRequested {
            file_id: request.file_id,
            source_path: request.source_path,
            destination_path: request.destination_path,
            reply_to: request.reply_to,
        }
    }
}

/// Terminal notification for a whole archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNotification {
    /// Identifier of the processed archive.
    pub archive_file_id: String,
    /// Final outcome of the run.
    pub outcome: FileOutcome,
    /// Address the requester listens on.
    pub reply_to: String,
}

impl From<ArchiveNotification> for Message {
    fn from(notification: ArchiveNotification) -> Self {
        Self::ArchiveProcessed {
            archive_file_id: notification.archive_file_id,
            outcome: notification.outcome,
            reply_to: notification.reply_to,
        }
    }
}

/// Publishes adaptation requests to workers.
#[async_trait]
pub trait RequestPublisher: Send + Sync {
    /// Publish one request.
    async fn publish_request(&self, request: AdaptationRequest) -> BusResult<MessageId>;
}

/// Reports the terminal outcome of an archive.
#[async_trait]
pub trait OutcomeNotifier: Send + Sync {
    /// Publish one archive-level notification.
    async fn notify(&self, notification: ArchiveNotification) -> BusResult<MessageId>;
}

#[async_trait]
impl RequestPublisher for MessageBus {
    async fn publish_request(&self, request: AdaptationRequest) -> BusResult<MessageId> {
        self.publish(request.into())
    }
}

#[async_trait]
impl OutcomeNotifier for MessageBus {
    async fn notify(&self, notification: ArchiveNotification) -> BusResult<MessageId> {
        self.publish(notification.into())
    }
}

/// Build the reply a worker sends back for `file_id`.
#[must_use]
pub const fn completion(file_id: CorrelationId, outcome: AdaptationOutcome) -> Message {
    Message::AdaptationCompleted { file_id, outcome }
}
