//! Error types for configuration loading.
//!
//! # Design
//! - Constant error messages; the offending field and value travel as context.
//! - Preserve IO and JSON sources for callers that want to report them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was absent from both the file and the environment.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Reading the settings file failed.
    #[error("configuration file could not be read")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path of the settings file.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
    /// The settings file was not valid JSON for the expected document.
    #[error("configuration file could not be parsed")]
    Json {
        /// Path of the settings file.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
