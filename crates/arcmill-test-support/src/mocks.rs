//! Recording collaborators for exercising archive processing without a broker.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use arcmill_events::{
    AdaptationRequest, ArchiveNotification, BusError, BusResult, MessageId, OutcomeNotifier,
    RequestPublisher,
};
use arcmill_fsops::{
    ArchiveManager, ErrorReportGenerator, FileManager, FsOpsError, FsOpsResult, LocalFileManager,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Report body returned by [`RecordingReportGenerator`].
pub const FAKE_REPORT: &str = "Error Report";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn message_id(count: usize) -> MessageId {
    MessageId::try_from(count).unwrap_or(MessageId::MAX)
}

fn scripted_failure(field: &'static str) -> FsOpsError {
    FsOpsError::InvalidInput {
        field,
        reason: "scripted_failure",
        value: None,
    }
}

/// [`FileManager`] that delegates to the local filesystem and records every mutating call.
#[derive(Debug, Default)]
pub struct RecordingFileManager {
    inner: LocalFileManager,
    calls: Mutex<Vec<(&'static str, PathBuf)>>,
}

impl RecordingFileManager {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded `(operation, path)` pair in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(&'static str, PathBuf)> {
        lock(&self.calls).clone()
    }

    /// Paths recorded for `operation`.
    #[must_use]
    pub fn paths_for(&self, operation: &str) -> Vec<PathBuf> {
        lock(&self.calls)
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn record(&self, operation: &'static str, path: &Path) {
        lock(&self.calls).push((operation, path.to_path_buf()));
    }
}

impl FileManager for RecordingFileManager {
    fn file_exists(&self, path: &Path) -> bool {
        self.inner.file_exists(path)
    }

    fn directory_exists(&self, path: &Path) -> bool {
        self.inner.directory_exists(path)
    }

    fn create_directory(&self, path: &Path) -> FsOpsResult<()> {
        self.record("create_directory", path);
        self.inner.create_directory(path)
    }

    fn delete_directory(&self, path: &Path) -> FsOpsResult<()> {
        self.record("delete_directory", path);
        self.inner.delete_directory(path)
    }

    fn delete_file(&self, path: &Path) -> FsOpsResult<()> {
        self.record("delete_file", path);
        self.inner.delete_file(path)
    }

    fn list_files(&self, directory: &Path) -> FsOpsResult<Vec<PathBuf>> {
        self.inner.list_files(directory)
    }

    fn move_file(&self, from: &Path, to: &Path) -> FsOpsResult<()> {
        self.record("move_file", to);
        self.inner.move_file(from, to)
    }
}

/// One recorded `add_to_archive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCall {
    /// Archive that was appended to.
    pub archive: PathBuf,
    /// File whose contents were appended.
    pub source: PathBuf,
    /// Entry name inside the archive.
    pub entry_name: String,
}

/// [`ArchiveManager`] that records calls without touching disk.
#[derive(Debug, Default)]
pub struct RecordingArchiveManager {
    appends: Mutex<Vec<AppendCall>>,
    finished: Mutex<Vec<PathBuf>>,
    fail_appends: bool,
    extraction_delay: Option<Duration>,
    ignore_cancellation: bool,
}

impl RecordingArchiveManager {
    /// Create a recorder whose calls all succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder whose appends always fail.
    #[must_use]
    pub fn failing_appends() -> Self {
        Self {
            fail_appends: true,
            ..Self::default()
        }
    }

    /// Create a recorder whose extraction blocks its thread for `delay`, polling
    /// the cancellation token every few milliseconds.
    #[must_use]
    pub fn slow_extraction(delay: Duration) -> Self {
        Self {
            extraction_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Like [`RecordingArchiveManager::slow_extraction`], but the token is never checked.
    #[must_use]
    pub fn uninterruptible_extraction(delay: Duration) -> Self {
        Self {
            extraction_delay: Some(delay),
            ignore_cancellation: true,
            ..Self::default()
        }
    }

    /// Every recorded append in call order.
    #[must_use]
    pub fn appends(&self) -> Vec<AppendCall> {
        lock(&self.appends).clone()
    }

    /// Archives passed to `finish_archive`, in call order.
    #[must_use]
    pub fn finished(&self) -> Vec<PathBuf> {
        lock(&self.finished).clone()
    }
}

impl ArchiveManager for RecordingArchiveManager {
    fn extract_archive(
        &self,
        archive: &Path,
        _target_dir: &Path,
        cancel: &CancellationToken,
    ) -> FsOpsResult<()> {
        let Some(delay) = self.extraction_delay else {
            return Ok(());
        };
        let started = Instant::now();
        while started.elapsed() < delay {
            if !self.ignore_cancellation && cancel.is_cancelled() {
                return Err(FsOpsError::Interrupted {
                    operation: "extract_archive.entry",
                    path: archive.to_path_buf(),
                });
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }

    fn create_archive(&self, _source_dir: &Path, _archive: &Path) -> FsOpsResult<()> {
        Ok(())
    }

    fn add_to_archive(&self, archive: &Path, file: &Path, entry_name: &str) -> FsOpsResult<()> {
        if self.fail_appends {
            return Err(scripted_failure("archive"));
        }
        lock(&self.appends).push(AppendCall {
            archive: archive.to_path_buf(),
            source: file.to_path_buf(),
            entry_name: entry_name.to_string(),
        });
        Ok(())
    }

    fn finish_archive(&self, archive: &Path) -> FsOpsResult<()> {
        lock(&self.finished).push(archive.to_path_buf());
        Ok(())
    }
}

/// [`ErrorReportGenerator`] that records keys and returns [`FAKE_REPORT`].
#[derive(Debug, Default)]
pub struct RecordingReportGenerator {
    keys: Mutex<Vec<String>>,
}

impl RecordingReportGenerator {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys registered so far, duplicates included.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.keys).clone()
    }
}

impl ErrorReportGenerator for RecordingReportGenerator {
    fn add_id_to_report(&self, key: &str) -> FsOpsResult<String> {
        lock(&self.keys).push(key.to_string());
        Ok(FAKE_REPORT.to_string())
    }
}

/// [`OutcomeNotifier`] that records every notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ArchiveNotification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<ArchiveNotification> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl OutcomeNotifier for RecordingNotifier {
    async fn notify(&self, notification: ArchiveNotification) -> BusResult<MessageId> {
        let mut sent = lock(&self.sent);
        sent.push(notification);
        Ok(message_id(sent.len()))
    }
}

/// [`RequestPublisher`] that records requests and can start failing after a set count.
#[derive(Debug, Default)]
pub struct ScriptedPublisher {
    requests: Mutex<Vec<AdaptationRequest>>,
    fail_after: Option<usize>,
}

impl ScriptedPublisher {
    /// Create a publisher that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a publisher that accepts `accepted` requests and rejects the rest.
    #[must_use]
    pub fn failing_after(accepted: usize) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_after: Some(accepted),
        }
    }

    /// Requests accepted so far.
    #[must_use]
    pub fn requests(&self) -> Vec<AdaptationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl RequestPublisher for ScriptedPublisher {
    async fn publish_request(&self, request: AdaptationRequest) -> BusResult<MessageId> {
        let mut requests = lock(&self.requests);
        if self.fail_after.is_some_and(|limit| requests.len() >= limit) {
            return Err(BusError::Rejected {
                message_kind: "adaptation_requested",
                reason: "scripted_failure",
            });
        }
        requests.push(request);
        Ok(message_id(requests.len()))
    }
}
