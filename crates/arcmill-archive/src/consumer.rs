//! Turns adaptation outcomes into entries of the output archive.
//!
//! # Design
//! - `Replace` takes the rebuilt file, `Unmodified` the original, both under the entry
//!   name recorded at extraction.
//! - `Failed` registers `{archive_file_id}/{id}` with the report generator and appends
//!   the shared report. Several failures append the same report several times.
//! - Entries are appended in the order outcomes are taken, each on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arcmill_events::{AdaptationOutcome, CorrelationId};
use arcmill_fsops::{ArchiveManager, ERROR_REPORT_FILE_NAME, ErrorReportGenerator};
use arcmill_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collection::OutcomeCollection;
use crate::error::{ArchiveError, ArchiveResult};
use crate::job::FileMapping;

/// Single consumer of an [`OutcomeCollection`].
#[derive(Clone)]
pub struct ResponseConsumer {
    collection: Arc<OutcomeCollection>,
    archives: Arc<dyn ArchiveManager>,
    reports: Arc<dyn ErrorReportGenerator>,
    archive_file_id: String,
    output_path: PathBuf,
    metrics: Metrics,
}

impl ResponseConsumer {
    /// Create a consumer appending to the archive at `output_path`.
    #[must_use]
    pub fn new(
        collection: Arc<OutcomeCollection>,
        archives: Arc<dyn ArchiveManager>,
        reports: Arc<dyn ErrorReportGenerator>,
        archive_file_id: impl Into<String>,
        output_path: impl Into<PathBuf>,
        metrics: Metrics,
    ) -> Self {
        Self {
            collection,
            archives,
            reports,
            archive_file_id: archive_file_id.into(),
            output_path: output_path.into(),
            metrics,
        }
    }

    /// Append one entry per outcome until the collection is completed and drained.
    ///
    /// Returns the number of entries appended. Cancellation stops the loop early
    /// without error.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MissingMapping`] when a `Replace` or `Unmodified` outcome
    /// has no recorded entry name, and [`ArchiveError::FsOps`] when the report or the
    /// archive cannot be written.
    pub async fn drain(
        &self,
        mappings: &FileMapping,
        rebuilt_dir: &Path,
        original_dir: &Path,
        cancel: &CancellationToken,
    ) -> ArchiveResult<usize> {
        let mut appended = 0;
        while !self.collection.is_completed() {
            if cancel.is_cancelled() {
                debug!(appended, "outcome consumption cancelled");
                return Ok(appended);
            }
            let Some((file_id, outcome)) = self.collection.try_take(cancel).await else {
                continue;
            };
            self.metrics.inc_outcome(outcome.as_str());

            let (source, entry_name) =
                self.resolve(file_id, outcome, mappings, rebuilt_dir, original_dir)?;
            debug!(%file_id, outcome = outcome.as_str(), entry = %entry_name, "appending archive entry");
            self.append(source, entry_name).await?;
            self.metrics.inc_entry_appended();
            appended += 1;
        }

        info!(appended, "all adaptation outcomes consumed");
        Ok(appended)
    }

    async fn append(&self, source: PathBuf, entry_name: String) -> ArchiveResult<()> {
        let archives = Arc::clone(&self.archives);
        let output_path = self.output_path.clone();
        tokio::task::spawn_blocking(move || {
            archives.add_to_archive(&output_path, &source, &entry_name)
        })
        .await
        .map_err(|source| ArchiveError::Join { source })?
        .map_err(|source| ArchiveError::fsops("consumer.add_to_archive", source))
    }

    fn resolve(
        &self,
        file_id: CorrelationId,
        outcome: AdaptationOutcome,
        mappings: &FileMapping,
        rebuilt_dir: &Path,
        original_dir: &Path,
    ) -> ArchiveResult<(PathBuf, String)> {
        let mapped = || {
            mappings
                .get(&file_id)
                .map(str::to_string)
                .ok_or(ArchiveError::MissingMapping { file_id })
        };
        match outcome {
            AdaptationOutcome::Replace => {
                Ok((rebuilt_dir.join(file_id.to_string()), mapped()?))
            }
            AdaptationOutcome::Unmodified => {
                Ok((original_dir.join(file_id.to_string()), mapped()?))
            }
            AdaptationOutcome::Failed => {
                let key = format!("{}/{file_id}", self.archive_file_id);
                self.reports
                    .add_id_to_report(&key)
                    .map_err(|source| ArchiveError::fsops("consumer.error_report", source))?;
                Ok((
                    rebuilt_dir.join(ERROR_REPORT_FILE_NAME),
                    ERROR_REPORT_FILE_NAME.to_string(),
                ))
            }
        }
    }
}
