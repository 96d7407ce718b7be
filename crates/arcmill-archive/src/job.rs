//! Job description, temporary workspace layout, and the id-to-entry-name mapping.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use arcmill_config::ArchiveProcessorConfig;
use arcmill_events::CorrelationId;
use uuid::Uuid;

const TEMP_SUFFIX: &str = "_tmp";

/// One archive-processing request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveJob {
    /// Identifier of the archive, used in report keys and notifications.
    pub archive_file_id: String,
    /// Archive to process.
    pub input_path: PathBuf,
    /// Where the rebuilt archive is written.
    pub output_path: PathBuf,
    /// Address the terminal outcome is reported to.
    pub reply_to: String,
    /// Wall-clock budget for the whole run.
    pub processing_timeout: Duration,
    /// Send an `Error` outcome when the budget elapses.
    pub notify_on_timeout: bool,
}

impl ArchiveJob {
    /// Build a job from validated configuration.
    #[must_use]
    pub fn from_config(config: &ArchiveProcessorConfig) -> Self {
        Self {
            archive_file_id: config.archive_file_id.clone(),
            input_path: config.input_path.clone(),
            output_path: config.output_path.clone(),
            reply_to: config.reply_to.clone(),
            processing_timeout: config.processing_timeout,
            notify_on_timeout: config.notify_on_timeout,
        }
    }

    /// Temporary directories derived from the job's paths.
    #[must_use]
    pub fn workspace(&self) -> TempWorkspace {
        TempWorkspace::for_paths(&self.input_path, &self.output_path)
    }
}

/// Scratch directories used while a job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempWorkspace {
    /// Holds extracted originals, keyed by correlation id.
    pub original_dir: PathBuf,
    /// Receives rebuilt files and the error report.
    pub rebuilt_dir: PathBuf,
}

impl TempWorkspace {
    /// `{input}_tmp` and `{output}_tmp`.
    #[must_use]
    pub fn for_paths(input_path: &Path, output_path: &Path) -> Self {
        Self {
            original_dir: with_suffix(input_path),
            rebuilt_dir: with_suffix(output_path),
        }
    }

    /// Location of the original file for `file_id`.
    #[must_use]
    pub fn original_file(&self, file_id: CorrelationId) -> PathBuf {
        self.original_dir.join(file_id.to_string())
    }

    /// Location the worker writes the rebuilt file for `file_id` to.
    #[must_use]
    pub fn rebuilt_file(&self, file_id: CorrelationId) -> PathBuf {
        self.rebuilt_dir.join(file_id.to_string())
    }

    /// Directory one run unpacks the input archive into before its members are
    /// moved to their correlation-id paths. Anything else under `original_dir`
    /// is never picked up as a member.
    #[must_use]
    pub fn extraction_dir(&self, run_id: Uuid) -> PathBuf {
        self.original_dir.join(format!("extract-{run_id}"))
    }
}

fn with_suffix(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(TEMP_SUFFIX);
    PathBuf::from(raw)
}

/// Correlation id to archive entry name, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMapping {
    order: Vec<CorrelationId>,
    names: HashMap<CorrelationId, String>,
}

impl FileMapping {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` for `file_id`. Returns `false` if the id was already present.
    pub fn insert(&mut self, file_id: CorrelationId, name: impl Into<String>) -> bool {
        if self.names.contains_key(&file_id) {
            return false;
        }
        self.order.push(file_id);
        self.names.insert(file_id, name.into());
        true
    }

    /// Entry name recorded for `file_id`.
    #[must_use]
    pub fn get(&self, file_id: &CorrelationId) -> Option<&str> {
        self.names.get(file_id).map(String::as_str)
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = CorrelationId> + '_ {
        self.order.iter().copied()
    }

    /// Number of mapped files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no files are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Archive entry name for a file extracted below `root`, using `/` separators.
///
/// Returns `None` when `path` does not live below `root`.
#[must_use]
pub fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}
