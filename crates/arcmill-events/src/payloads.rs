//! Message payload types carried across the broker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each message published on the bus.
pub type MessageId = u64;

/// Per-file correlation token linking an adaptation request to its reply.
pub type CorrelationId = Uuid;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Terminal classification of one file's adaptation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationOutcome {
    /// A rebuilt file is available at the requested destination.
    Replace,
    /// The original file should be kept as-is.
    Unmodified,
    /// Adaptation failed and an error report must be substituted.
    Failed,
}

impl AdaptationOutcome {
    /// Lowercase label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Unmodified => "unmodified",
            Self::Failed => "failed",
        }
    }
}

/// Terminal result reported for a whole archive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    /// The rebuilt archive replaces the submitted one.
    Replace,
    /// Processing failed.
    Error,
}

impl FileOutcome {
    /// Lowercase label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Error => "error",
        }
    }
}

/// Typed messages exchanged between the archive processor and workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A single extracted file was submitted for adaptation.
    AdaptationRequested {
        /// Correlation id the worker must echo back.
        file_id: CorrelationId,
        /// Path of the original file.
        source_path: String,
        /// Path the worker writes the rebuilt file to.
        destination_path: String,
        /// Address replies are routed to.
        reply_to: String,
    },
    /// A worker finished processing a single file.
    AdaptationCompleted {
        /// Correlation id copied from the request.
        file_id: CorrelationId,
        /// Outcome reported by the worker.
        outcome: AdaptationOutcome,
    },
    /// Terminal notification for a whole archive.
    ArchiveProcessed {
        /// Identifier of the processed archive.
        archive_file_id: String,
        /// Final outcome of the run.
        outcome: FileOutcome,
        /// Address the requester listens on.
        reply_to: String,
    },
}

impl Message {
    /// Machine-friendly discriminator for routing and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AdaptationRequested { .. } => "adaptation_requested",
            Self::AdaptationCompleted { .. } => "adaptation_completed",
            Self::ArchiveProcessed { .. } => "archive_processed",
        }
    }
}

/// Metadata wrapper around messages. Each envelope tracks the message id and
/// publish timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: MessageId,
    /// Publish time.
    pub timestamp: DateTime<Utc>,
    /// Message payload.
    pub message: Message,
}
