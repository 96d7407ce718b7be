//! # Design
//!
//! - Centralize application-level errors for bootstrap and processing.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::time::Duration;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: arcmill_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: arcmill_telemetry::TelemetryError,
    },
    /// The archive could not be processed.
    #[error("archive processing failed")]
    Processing {
        /// Identifier of the archive.
        archive_file_id: String,
        /// Source processing error.
        source: arcmill_archive::ArchiveError,
    },
    /// The processing budget elapsed.
    #[error("archive processing timed out")]
    TimedOut {
        /// Identifier of the archive.
        archive_file_id: String,
        /// Budget that elapsed.
        after: Duration,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: arcmill_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: arcmill_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
