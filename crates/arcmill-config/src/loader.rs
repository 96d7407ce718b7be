//! Settings loader: optional JSON file overlaid by environment variables.
//!
//! # Design
//! - A missing settings file is not an error; a malformed one is.
//! - Environment values always win over file values.
//! - Environment access goes through [`EnvSource`] so tests never touch the
//!   process environment.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::defaults::{
    DEFAULT_BROKER_HOST, DEFAULT_BROKER_PASSWORD, DEFAULT_BROKER_PORT, DEFAULT_BROKER_USER,
    DEFAULT_CONFIG_FILE, DEFAULT_PROCESSING_TIMEOUT_SECS,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ArchiveProcessorConfig, ConfigDocument, MessageBrokerConfig};
use crate::validate::{
    parse_flag, parse_port, parse_timeout_secs, require_path, require_text, text_or_default,
    timeout_from_secs,
};

/// Source of environment-style key/value pairs.
pub trait EnvSource {
    /// Look up a single variable, returning `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads variables from the current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Builds an [`ArchiveProcessorConfig`] from a settings file and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader<E = ProcessEnv> {
    file: PathBuf,
    env: E,
}

impl ConfigLoader<ProcessEnv> {
    /// Loader reading `config/appsettings.json` and the process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            file: PathBuf::from(DEFAULT_CONFIG_FILE),
            env: ProcessEnv,
        }
    }
}

impl<E: EnvSource> ConfigLoader<E> {
    /// Loader over an arbitrary settings file and environment source.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, env: E) -> Self {
        Self {
            file: file.into(),
            env,
        }
    }

    /// Settings file consulted by this loader.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Read, merge, and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings file exists but cannot be read or
    /// parsed, when a required field is missing, or when a value is invalid.
    pub fn load(&self) -> ConfigResult<ArchiveProcessorConfig> {
        let document = self.read_document()?;
        let merged = self.overlay_env(document)?;
        build_config(merged)
    }

    fn read_document(&self) -> ConfigResult<ConfigDocument> {
        let raw = match fs::read_to_string(&self.file) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.file.display(), "settings file absent; using environment only");
                return Ok(ConfigDocument::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    operation: "config.read_file",
                    path: self.file.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: self.file.clone(),
            source,
        })
    }

    fn overlay_env(&self, mut document: ConfigDocument) -> ConfigResult<ConfigDocument> {
        let text = |name: &str, slot: &mut Option<String>| {
            if let Some(value) = self.env.var(name) {
                *slot = Some(value);
            }
        };
        text("INPUT_PATH", &mut document.input_path);
        text("OUTPUT_PATH", &mut document.output_path);
        text("ARCHIVE_FILE_ID", &mut document.archive_file_id);
        text("REPLY_TO", &mut document.reply_to);
        text("MESSAGE_BROKER_HOST", &mut document.message_broker_host);
        text("MESSAGE_BROKER_USER", &mut document.message_broker_user);
        text("MESSAGE_BROKER_PASSWORD", &mut document.message_broker_password);
        text("LOG_FORMAT", &mut document.log_format);

        if let Some(raw) = self.env.var("PROCESSING_TIMEOUT_SECS") {
            document.processing_timeout_secs =
                Some(parse_timeout_secs("processing_timeout_secs", &raw)?);
        }
        if let Some(raw) = self.env.var("MESSAGE_BROKER_PORT") {
            document.message_broker_port = Some(parse_port("message_broker_port", &raw)?);
        }
        if let Some(raw) = self.env.var("NOTIFY_ON_TIMEOUT") {
            document.notify_on_timeout = Some(parse_flag("notify_on_timeout", &raw)?);
        }
        if let Some(raw) = self.env.var("LOCAL_WORKER") {
            document.local_worker = Some(parse_flag("local_worker", &raw)?);
        }
        Ok(document)
    }
}

fn build_config(document: ConfigDocument) -> ConfigResult<ArchiveProcessorConfig> {
    let processing_timeout = timeout_from_secs(
        "processing_timeout_secs",
        document
            .processing_timeout_secs
            .unwrap_or(DEFAULT_PROCESSING_TIMEOUT_SECS),
    )?;
    let port = document.message_broker_port.unwrap_or(DEFAULT_BROKER_PORT);
    if port == 0 {
        return Err(ConfigError::InvalidField {
            field: "message_broker_port",
            reason: "zero",
            value: Some(port.to_string()),
        });
    }

    Ok(ArchiveProcessorConfig {
        input_path: require_path("input_path", document.input_path)?,
        output_path: require_path("output_path", document.output_path)?,
        archive_file_id: require_text("archive_file_id", document.archive_file_id)?,
        reply_to: require_text("reply_to", document.reply_to)?,
        processing_timeout,
        message_broker: MessageBrokerConfig {
            host: text_or_default(document.message_broker_host, DEFAULT_BROKER_HOST),
            port,
            user: text_or_default(document.message_broker_user, DEFAULT_BROKER_USER),
            password: text_or_default(document.message_broker_password, DEFAULT_BROKER_PASSWORD),
        },
        notify_on_timeout: document.notify_on_timeout.unwrap_or(false),
        local_worker: document.local_worker.unwrap_or(false),
        log_format: document
            .log_format
            .map(|format| format.trim().to_ascii_lowercase())
            .filter(|format| !format.is_empty()),
    })
}
