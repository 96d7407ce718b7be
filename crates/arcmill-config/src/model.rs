//! Typed configuration models.
//!
//! # Design
//! - `ConfigDocument` mirrors the settings file with every field optional.
//! - `ArchiveProcessorConfig` is the validated, fully-populated view handed to
//!   the rest of the workspace.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Raw settings document as read from the JSON settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "snake_case")]
pub struct ConfigDocument {
    /// Path of the archive to process.
    pub input_path: Option<String>,
    /// Path the rebuilt archive is written to.
    pub output_path: Option<String>,
    /// Identifier of the archive being processed.
    pub archive_file_id: Option<String>,
    /// Address the terminal outcome is reported to.
    pub reply_to: Option<String>,
    /// Processing budget in whole seconds.
    pub processing_timeout_secs: Option<u64>,
    /// Broker host name.
    pub message_broker_host: Option<String>,
    /// Broker port.
    pub message_broker_port: Option<u16>,
    /// Broker user name.
    pub message_broker_user: Option<String>,
    /// Broker password.
    pub message_broker_password: Option<String>,
    /// Send an `Error` outcome when the processing budget elapses.
    pub notify_on_timeout: Option<bool>,
    /// Answer adaptation requests in-process instead of waiting on workers.
    pub local_worker: Option<bool>,
    /// Log output format (`json` or `pretty`).
    pub log_format: Option<String>,
}

/// Connection settings for the message broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBrokerConfig {
    /// Broker host name.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Broker user name.
    pub user: String,
    /// Broker password.
    pub password: String,
}

/// Validated configuration for a single archive-processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveProcessorConfig {
    /// Path of the archive to process.
    pub input_path: PathBuf,
    /// Path the rebuilt archive is written to.
    pub output_path: PathBuf,
    /// Identifier of the archive being processed.
    pub archive_file_id: String,
    /// Address the terminal outcome is reported to.
    pub reply_to: String,
    /// Wall-clock budget for the whole run.
    pub processing_timeout: Duration,
    /// Broker connection settings.
    pub message_broker: MessageBrokerConfig,
    /// Send an `Error` outcome when the processing budget elapses.
    pub notify_on_timeout: bool,
    /// Answer adaptation requests in-process instead of waiting on workers.
    pub local_worker: bool,
    /// Requested log output format, if any.
    pub log_format: Option<String>,
}
