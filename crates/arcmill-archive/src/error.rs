//! # Design
//!
//! - Errors carry the correlation id or path they concern as fields.
//! - Per-file `Failed` outcomes are data, never errors.

use std::path::PathBuf;

use arcmill_events::{BusError, CorrelationId};
use arcmill_fsops::FsOpsError;
use thiserror::Error;
use tokio::task::JoinError;

/// Result alias for archive processing.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Reasons the outcome collection refuses an operation.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum OutcomeError {
    /// The collection is already completed.
    #[error("outcome collection is completed")]
    Completed {
        /// Id that was offered.
        file_id: CorrelationId,
    },
    /// Registration was attempted after the collection was sealed.
    #[error("outcome collection is sealed")]
    Sealed {
        /// Id that was offered.
        file_id: CorrelationId,
    },
    /// No request was dispatched for the id.
    #[error("outcome for unexpected correlation id")]
    Unexpected {
        /// Id that was offered.
        file_id: CorrelationId,
    },
    /// The id was already registered or already has an outcome.
    #[error("duplicate correlation id")]
    Duplicate {
        /// Id that was offered.
        file_id: CorrelationId,
    },
}

impl OutcomeError {
    /// Correlation id the failure concerns.
    #[must_use]
    pub const fn file_id(&self) -> CorrelationId {
        match self {
            Self::Completed { file_id }
            | Self::Sealed { file_id }
            | Self::Unexpected { file_id }
            | Self::Duplicate { file_id } => *file_id,
        }
    }
}

/// Failures that abort processing of an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input archive does not exist.
    #[error("input archive not found")]
    NotFound {
        /// Path that was checked.
        path: PathBuf,
    },
    /// The broker refused an adaptation request.
    #[error("adaptation request dispatch failed")]
    Dispatch {
        /// Id of the request that was refused.
        file_id: CorrelationId,
        /// Transport failure.
        source: BusError,
    },
    /// A filesystem, archive, or report collaborator failed.
    #[error("filesystem collaborator failed")]
    FsOps {
        /// Processing step that invoked the collaborator.
        operation: &'static str,
        /// Collaborator failure.
        source: FsOpsError,
    },
    /// An outcome arrived for an id with no recorded entry name.
    #[error("no file mapping for correlation id")]
    MissingMapping {
        /// Id without a mapping.
        file_id: CorrelationId,
    },
    /// The outcome collection refused an operation.
    #[error("outcome collection rejected operation")]
    Collection {
        /// Collection failure.
        source: OutcomeError,
    },
    /// The processing task panicked or was aborted.
    #[error("processing task failed")]
    Join {
        /// Task failure.
        source: JoinError,
    },
}

impl ArchiveError {
    pub(crate) const fn fsops(operation: &'static str, source: FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }
}

impl From<OutcomeError> for ArchiveError {
    fn from(source: OutcomeError) -> Self {
        Self::Collection { source }
    }
}
