//! End-to-end processing of one archive under a wall-clock budget.
//!
//! # Design
//! - The run is spawned as its own task and raced against the budget; on elapse the
//!   shared cancellation token fires and the collection is force-completed. The run gets
//!   [`SHUTDOWN_GRACE`] to stop on its own and is aborted after that, so cleanup never
//!   waits on it unboundedly.
//! - Extraction and archive writes run on the blocking pool so the budget timer keeps
//!   firing while they work.
//! - Dispatch and consumption overlap. The collection is sealed after the last dispatch.
//! - Temporary directories are removed on every path once the workspace was created.
//!   Pre-existing temp directories are reused, never cleared up front; extraction goes
//!   to a run-scoped staging directory so leftovers are not mistaken for members.
//!   The output archive survives only a successful run.
//! - Exactly one terminal notification on success or failure; a timeout sends none
//!   unless the job asks for it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arcmill_events::{ArchiveNotification, FileOutcome, OutcomeNotifier, RequestPublisher};
use arcmill_fsops::{ArchiveManager, ErrorReportGenerator, FileManager};
use arcmill_telemetry::{Metrics, job_span};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use crate::collection::OutcomeCollection;
use crate::consumer::ResponseConsumer;
use crate::dispatcher::{DispatchStatus, RequestDispatcher};
use crate::error::{ArchiveError, ArchiveResult};
use crate::job::{ArchiveJob, FileMapping, TempWorkspace, entry_name};

/// How long an abandoned run may take to stop before it is aborted.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Collaborators an orchestrator works through.
#[derive(Clone)]
pub struct Collaborators {
    /// Raw filesystem access.
    pub files: Arc<dyn FileManager>,
    /// Archive codec.
    pub archives: Arc<dyn ArchiveManager>,
    /// Error report accumulator for this job.
    pub reports: Arc<dyn ErrorReportGenerator>,
    /// Transport for adaptation requests.
    pub publisher: Arc<dyn RequestPublisher>,
    /// Transport for the terminal notification.
    pub notifier: Arc<dyn OutcomeNotifier>,
}

/// How a run ended.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The output archive was assembled.
    Completed {
        /// Entries appended to the output archive.
        entries: usize,
    },
    /// Processing failed and everything was cleaned up.
    Failed {
        /// Cause of the failure.
        error: ArchiveError,
    },
    /// The budget elapsed and everything was cleaned up.
    TimedOut {
        /// Budget that elapsed.
        after: Duration,
    },
}

impl ProcessingOutcome {
    /// Outcome reported to the requester, if any is reported.
    #[must_use]
    pub const fn file_outcome(&self) -> Option<FileOutcome> {
        match self {
            Self::Completed { .. } => Some(FileOutcome::Replace),
            Self::Failed { .. } => Some(FileOutcome::Error),
            Self::TimedOut { .. } => None,
        }
    }

    /// Metric and log label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "replace",
            Self::Failed { .. } => "error",
            Self::TimedOut { .. } => "timeout",
        }
    }
}

/// Drives one [`ArchiveJob`] from extraction to notification.
pub struct ArchiveOrchestrator {
    job: ArchiveJob,
    collaborators: Collaborators,
    collection: Arc<OutcomeCollection>,
    cancel: CancellationToken,
    metrics: Metrics,
}

impl ArchiveOrchestrator {
    /// Create an orchestrator with a fresh outcome collection and cancellation token.
    #[must_use]
    pub fn new(job: ArchiveJob, collaborators: Collaborators, metrics: Metrics) -> Self {
        Self {
            job,
            collaborators,
            collection: Arc::new(OutcomeCollection::new()),
            cancel: CancellationToken::new(),
            metrics,
        }
    }

    /// Collection replies must be delivered into.
    #[must_use]
    pub fn collection(&self) -> Arc<OutcomeCollection> {
        Arc::clone(&self.collection)
    }

    /// Token fired when the job is abandoned.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Job being processed.
    #[must_use]
    pub const fn job(&self) -> &ArchiveJob {
        &self.job
    }

    /// Process the archive. Never panics on collaborator failure.
    pub async fn process(&self) -> ProcessingOutcome {
        let span = job_span(&self.job.archive_file_id);
        async {
            self.metrics.archive_started();
            info!(input = %self.job.input_path.display(), "archive processing started");

            let outcome = if self.collaborators.files.file_exists(&self.job.input_path) {
                self.run_bounded().await
            } else {
                let error = ArchiveError::NotFound {
                    path: self.job.input_path.clone(),
                };
                error!(error = %error, path = %self.job.input_path.display(), "input archive missing");
                self.notify(FileOutcome::Error).await;
                ProcessingOutcome::Failed { error }
            };

            self.metrics.inc_archive_result(outcome.label());
            self.metrics.archive_finished();
            info!(result = outcome.label(), "archive processing finished");
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_bounded(&self) -> ProcessingOutcome {
        let workspace = self.job.workspace();
        let run = JobRun {
            job: self.job.clone(),
            workspace: workspace.clone(),
            staging: workspace.extraction_dir(Uuid::new_v4()),
            files: Arc::clone(&self.collaborators.files),
            archives: Arc::clone(&self.collaborators.archives),
            collection: Arc::clone(&self.collection),
            dispatcher: RequestDispatcher::new(
                Arc::clone(&self.collaborators.publisher),
                Arc::clone(&self.collection),
                self.job.reply_to.clone(),
                self.metrics.clone(),
            ),
            consumer: ResponseConsumer::new(
                Arc::clone(&self.collection),
                Arc::clone(&self.collaborators.archives),
                Arc::clone(&self.collaborators.reports),
                self.job.archive_file_id.clone(),
                self.job.output_path.clone(),
                self.metrics.clone(),
            ),
            cancel: self.cancel.clone(),
        };
        let mut handle = tokio::spawn(run.execute().in_current_span());

        match tokio::time::timeout(self.job.processing_timeout, &mut handle).await {
            Ok(Ok(Ok(entries))) => {
                self.cleanup(&workspace, false, true);
                self.notify(FileOutcome::Replace).await;
                ProcessingOutcome::Completed { entries }
            }
            Ok(Ok(Err(error))) => self.fail(&workspace, error).await,
            Ok(Err(source)) => self.fail(&workspace, ArchiveError::Join { source }).await,
            Err(_elapsed) => {
                let after = self.job.processing_timeout;
                warn!(timeout_secs = after.as_secs_f64(), "processing budget elapsed");
                self.abandon();
                let stopped = tokio::time::timeout(SHUTDOWN_GRACE, &mut handle)
                    .await
                    .is_ok();
                if !stopped {
                    warn!(
                        grace_secs = SHUTDOWN_GRACE.as_secs_f64(),
                        "run did not stop within grace period; aborting"
                    );
                    handle.abort();
                }
                self.cleanup(&workspace, true, stopped);
                if self.job.notify_on_timeout {
                    self.notify(FileOutcome::Error).await;
                }
                ProcessingOutcome::TimedOut { after }
            }
        }
    }

    async fn fail(&self, workspace: &TempWorkspace, error: ArchiveError) -> ProcessingOutcome {
        error!(error = %error, detail = ?error, "archive processing failed");
        self.abandon();
        self.cleanup(workspace, true, true);
        self.notify(FileOutcome::Error).await;
        ProcessingOutcome::Failed { error }
    }

    fn abandon(&self) {
        self.cancel.cancel();
        self.collection.mark_completed();
    }

    /// `run_stopped` is false when the run was aborted and may still hold the output
    /// writer on the blocking pool.
    fn cleanup(&self, workspace: &TempWorkspace, remove_output: bool, run_stopped: bool) {
        let files = &self.collaborators.files;
        remove_directory(files.as_ref(), &workspace.rebuilt_dir);
        if remove_output
            && run_stopped
            && let Err(err) = self.collaborators.archives.finish_archive(&self.job.output_path)
        {
            warn!(error = %err, path = %self.job.output_path.display(), "failed to close partial output archive");
        }
        if remove_output
            && files.file_exists(&self.job.output_path)
            && let Err(err) = files.delete_file(&self.job.output_path)
        {
            warn!(error = %err, path = %self.job.output_path.display(), "failed to remove partial output archive");
        }
        remove_directory(files.as_ref(), &workspace.original_dir);
    }

    async fn notify(&self, outcome: FileOutcome) {
        let notification = ArchiveNotification {
            archive_file_id: self.job.archive_file_id.clone(),
            outcome,
            reply_to: self.job.reply_to.clone(),
        };
        match self.collaborators.notifier.notify(notification).await {
            Ok(message_id) => info!(outcome = outcome.as_str(), message_id, "outcome reported"),
            Err(err) => warn!(outcome = outcome.as_str(), error = %err, "failed to report outcome"),
        }
    }
}

fn remove_directory(files: &dyn FileManager, path: &Path) {
    if !files.directory_exists(path) {
        return;
    }
    if let Err(err) = files.delete_directory(path) {
        warn!(error = %err, path = %path.display(), "failed to remove temporary directory");
    }
}

/// Unpack into the run's staging directory, then move every member to its
/// correlation-id path. Runs on the blocking pool.
fn extract_members(
    files: &dyn FileManager,
    archives: &dyn ArchiveManager,
    input_path: &Path,
    staging: &Path,
    workspace: &TempWorkspace,
    cancel: &CancellationToken,
) -> ArchiveResult<FileMapping> {
    archives
        .extract_archive(input_path, staging, cancel)
        .map_err(|source| ArchiveError::fsops("extract.unpack", source))?;
    let extracted = files
        .list_files(staging)
        .map_err(|source| ArchiveError::fsops("extract.list_files", source))?;

    let mut mapping = FileMapping::new();
    for path in extracted {
        if cancel.is_cancelled() {
            break;
        }
        let Some(name) = entry_name(staging, &path) else {
            continue;
        };
        let file_id = Uuid::new_v4();
        files
            .move_file(&path, &workspace.original_file(file_id))
            .map_err(|source| ArchiveError::fsops("extract.move_file", source))?;
        mapping.insert(file_id, name);
    }
    files
        .delete_directory(staging)
        .map_err(|source| ArchiveError::fsops("extract.clear_staging", source))?;
    Ok(mapping)
}

struct JobRun {
    job: ArchiveJob,
    workspace: TempWorkspace,
    staging: PathBuf,
    files: Arc<dyn FileManager>,
    archives: Arc<dyn ArchiveManager>,
    collection: Arc<OutcomeCollection>,
    dispatcher: RequestDispatcher,
    consumer: ResponseConsumer,
    cancel: CancellationToken,
}

impl JobRun {
    async fn execute(self) -> ArchiveResult<usize> {
        self.prepare_workspace()?;
        let mapping = self.extract().await?;
        info!(files = mapping.len(), "archive extracted");

        let dispatch = self.dispatch_all(&mapping);
        let consume = self.consumer.drain(
            &mapping,
            &self.workspace.rebuilt_dir,
            &self.workspace.original_dir,
            &self.cancel,
        );
        let ((), entries) = tokio::try_join!(dispatch, consume)?;
        self.finish_output().await?;

        info!(entries, output = %self.job.output_path.display(), "output archive assembled");
        Ok(entries)
    }

    fn prepare_workspace(&self) -> ArchiveResult<()> {
        for dir in [&self.workspace.original_dir, &self.workspace.rebuilt_dir] {
            if self.files.directory_exists(dir) {
                debug!(path = %dir.display(), "reusing existing temporary directory");
            }
            self.files
                .create_directory(dir)
                .map_err(|source| ArchiveError::fsops("prepare.create_directory", source))?;
        }
        self.files
            .create_directory(&self.staging)
            .map_err(|source| ArchiveError::fsops("prepare.create_staging", source))?;
        self.archives
            .create_archive(&self.staging, &self.job.output_path)
            .map_err(|source| ArchiveError::fsops("prepare.create_output", source))
    }

    async fn extract(&self) -> ArchiveResult<FileMapping> {
        let files = Arc::clone(&self.files);
        let archives = Arc::clone(&self.archives);
        let input_path = self.job.input_path.clone();
        let staging = self.staging.clone();
        let workspace = self.workspace.clone();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || {
            extract_members(
                files.as_ref(),
                archives.as_ref(),
                &input_path,
                &staging,
                &workspace,
                &cancel,
            )
        })
        .await
        .map_err(|source| ArchiveError::Join { source })?
    }

    async fn finish_output(&self) -> ArchiveResult<()> {
        let archives = Arc::clone(&self.archives);
        let output_path = self.job.output_path.clone();
        tokio::task::spawn_blocking(move || archives.finish_archive(&output_path))
            .await
            .map_err(|source| ArchiveError::Join { source })?
            .map_err(|source| ArchiveError::fsops("finish.output", source))
    }

    async fn dispatch_all(&self, mapping: &FileMapping) -> ArchiveResult<()> {
        for file_id in mapping.ids() {
            let status = self
                .dispatcher
                .send(
                    file_id,
                    &self.workspace.original_file(file_id),
                    &self.workspace.rebuilt_file(file_id),
                    &self.cancel,
                )
                .await?;
            if status == DispatchStatus::Cancelled {
                return Ok(());
            }
        }
        self.collection.seal();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcmill_test_support::fixtures::temp_dir;
    use arcmill_test_support::mocks::{
        RecordingArchiveManager, RecordingFileManager, RecordingNotifier,
        RecordingReportGenerator, ScriptedPublisher,
    };
    use std::error::Error;
    use std::fs;
    use std::time::Instant;

    struct Harness {
        files: Arc<RecordingFileManager>,
        notifier: Arc<RecordingNotifier>,
        publisher: Arc<ScriptedPublisher>,
        orchestrator: ArchiveOrchestrator,
        metrics: Metrics,
    }

    fn job(root: &Path, timeout: Duration) -> ArchiveJob {
        ArchiveJob {
            archive_file_id: "archive-1".into(),
            input_path: root.join("input.zip"),
            output_path: root.join("output.zip"),
            reply_to: "replies".into(),
            processing_timeout: timeout,
            notify_on_timeout: false,
        }
    }

    fn harness(job: ArchiveJob, publisher: ScriptedPublisher) -> Result<Harness, Box<dyn Error>> {
        harness_with(job, publisher, RecordingArchiveManager::new())
    }

    fn harness_with(
        job: ArchiveJob,
        publisher: ScriptedPublisher,
        archives: RecordingArchiveManager,
    ) -> Result<Harness, Box<dyn Error>> {
        let files = Arc::new(RecordingFileManager::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let publisher = Arc::new(publisher);
        let metrics = Metrics::new()?;
        let orchestrator = ArchiveOrchestrator::new(
            job,
            Collaborators {
                files: Arc::clone(&files) as Arc<dyn FileManager>,
                archives: Arc::new(archives),
                reports: Arc::new(RecordingReportGenerator::new()),
                publisher: Arc::clone(&publisher) as Arc<dyn RequestPublisher>,
                notifier: Arc::clone(&notifier) as Arc<dyn OutcomeNotifier>,
            },
            metrics.clone(),
        );
        Ok(Harness {
            files,
            notifier,
            publisher,
            orchestrator,
            metrics,
        })
    }

    #[test]
    fn outcome_labels_and_file_outcomes() {
        assert_eq!(
            ProcessingOutcome::Completed { entries: 0 }.file_outcome(),
            Some(FileOutcome::Replace)
        );
        let timed_out = ProcessingOutcome::TimedOut {
            after: Duration::from_secs(1),
        };
        assert_eq!(timed_out.file_outcome(), None);
        assert_eq!(timed_out.label(), "timeout");
    }

    #[tokio::test]
    async fn missing_input_fails_fast_without_touching_disk() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let h = harness(job(temp.path(), Duration::from_secs(5)), ScriptedPublisher::new())?;

        let outcome = h.orchestrator.process().await;

        assert!(matches!(
            outcome,
            ProcessingOutcome::Failed {
                error: ArchiveError::NotFound { .. }
            }
        ));
        assert!(h.files.calls().is_empty());
        assert!(h.publisher.requests().is_empty());
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].outcome, FileOutcome::Error);
        assert_eq!(h.metrics.archive_result_count("error"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_archive_completes_immediately() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_secs(5));
        fs::write(&job.input_path, b"placeholder")?;
        let workspace = job.workspace();
        let h = harness(job, ScriptedPublisher::new())?;

        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::Completed { entries: 0 }));
        assert_eq!(h.notifier.sent()[0].outcome, FileOutcome::Replace);
        assert!(!workspace.original_dir.exists());
        assert!(!workspace.rebuilt_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn timeout_cleans_up_without_notifying() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_millis(50));
        fs::write(&job.input_path, b"placeholder")?;
        let workspace = job.workspace();
        fs::create_dir_all(&workspace.original_dir)?;
        let h = harness(job, ScriptedPublisher::new())?;
        // An outcome that never arrives keeps the run waiting past the budget.
        h.orchestrator
            .collection()
            .register(Uuid::new_v4())?;

        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::TimedOut { .. }));
        assert!(h.notifier.sent().is_empty());
        assert!(h.orchestrator.cancellation().is_cancelled());
        assert!(h.orchestrator.collection().is_adding_completed());
        assert!(!workspace.original_dir.exists());
        assert!(!workspace.rebuilt_dir.exists());
        assert!(
            h.files
                .paths_for("delete_directory")
                .contains(&workspace.rebuilt_dir)
        );
        assert_eq!(h.metrics.archive_result_count("timeout"), 1);
        Ok(())
    }

    #[tokio::test]
    async fn timeout_notifies_when_configured() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let mut job = job(temp.path(), Duration::from_millis(50));
        job.notify_on_timeout = true;
        fs::write(&job.input_path, b"placeholder")?;
        let h = harness(job, ScriptedPublisher::new())?;
        h.orchestrator
            .collection()
            .register(Uuid::new_v4())?;

        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::TimedOut { .. }));
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].outcome, FileOutcome::Error);
        Ok(())
    }

    #[tokio::test]
    async fn timeout_is_prompt_while_extraction_blocks() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_millis(100));
        fs::write(&job.input_path, b"placeholder")?;
        let workspace = job.workspace();
        let h = harness_with(
            job,
            ScriptedPublisher::new(),
            RecordingArchiveManager::slow_extraction(Duration::from_secs(30)),
        )?;

        let started = Instant::now();
        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_millis(100) + SHUTDOWN_GRACE);
        assert!(h.publisher.requests().is_empty());
        assert!(!workspace.original_dir.exists());
        assert!(!workspace.rebuilt_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn timeout_abandons_a_run_that_ignores_cancellation() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_millis(100));
        fs::write(&job.input_path, b"placeholder")?;
        let h = harness_with(
            job,
            ScriptedPublisher::new(),
            RecordingArchiveManager::uninterruptible_extraction(Duration::from_secs(3)),
        )?;

        let started = Instant::now();
        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::TimedOut { .. }));
        assert!(
            started.elapsed() < Duration::from_millis(100) + SHUTDOWN_GRACE + Duration::from_millis(500)
        );
        assert!(h.notifier.sent().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn existing_temp_directories_are_reused_not_cleared() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_secs(5));
        fs::write(&job.input_path, b"placeholder")?;
        let workspace = job.workspace();
        fs::create_dir_all(&workspace.original_dir)?;
        fs::write(workspace.original_dir.join("leftover.txt"), b"left")?;
        let h = harness(job, ScriptedPublisher::new())?;

        let outcome = h.orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::Completed { entries: 0 }));
        assert!(h.publisher.requests().is_empty());
        let deleted = h.files.paths_for("delete_directory");
        assert_eq!(
            deleted.iter().filter(|path| **path == workspace.original_dir).count(),
            1
        );
        // The end-of-run cleanup still removes the whole directory.
        assert!(!workspace.original_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn completed_run_finishes_the_output_archive() -> Result<(), Box<dyn Error>> {
        let temp = temp_dir()?;
        let job = job(temp.path(), Duration::from_secs(5));
        fs::write(&job.input_path, b"placeholder")?;
        let output = job.output_path.clone();
        let archives = Arc::new(RecordingArchiveManager::new());
        let orchestrator = ArchiveOrchestrator::new(
            job,
            Collaborators {
                files: Arc::new(RecordingFileManager::new()),
                archives: Arc::clone(&archives) as Arc<dyn ArchiveManager>,
                reports: Arc::new(RecordingReportGenerator::new()),
                publisher: Arc::new(ScriptedPublisher::new()),
                notifier: Arc::new(RecordingNotifier::new()),
            },
            Metrics::new()?,
        );

        let outcome = orchestrator.process().await;

        assert!(matches!(outcome, ProcessingOutcome::Completed { .. }));
        assert_eq!(archives.finished(), vec![output]);
        Ok(())
    }
}
