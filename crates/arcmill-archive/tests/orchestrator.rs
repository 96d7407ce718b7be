//! End-to-end runs over real zip archives, the in-process bus, and a scripted worker.

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arcmill_archive::{
    ArchiveError, ArchiveJob, ArchiveOrchestrator, Collaborators, ProcessingOutcome,
    ResponseListener,
};
use arcmill_events::{
    AdaptationOutcome, FileOutcome, Message, MessageBus, MessageStream, OutcomeNotifier,
    RequestPublisher, completion,
};
use arcmill_fsops::{
    ERROR_REPORT_FILE_NAME, FileManager, HtmlErrorReportGenerator, LocalFileManager,
    ZipArchiveManager,
};
use arcmill_telemetry::Metrics;
use arcmill_test_support::fixtures::{read_zip_entries, temp_dir, write_zip_fixture};
use arcmill_test_support::mocks::{RecordingNotifier, ScriptedPublisher};
use tokio::task::JoinHandle;
use tokio::time::timeout;

type TestResult<T> = Result<T, Box<dyn Error>>;

const ARCHIVE_ID: &str = "archive-7";

fn job(root: &Path, budget: Duration) -> ArchiveJob {
    ArchiveJob {
        archive_file_id: ARCHIVE_ID.into(),
        input_path: root.join("incoming.zip"),
        output_path: root.join("rebuilt.zip"),
        reply_to: "archive-replies".into(),
        processing_timeout: budget,
        notify_on_timeout: false,
    }
}

/// Answers requests based on the original file's contents: `replace*` is rebuilt,
/// `fail*` fails, `silent*` never answers, anything else is left unmodified.
fn spawn_worker(bus: &MessageBus) -> JoinHandle<()> {
    let mut stream = bus.subscribe(None);
    let bus = bus.clone();
    tokio::spawn(async move {
        while let Some(envelope) = stream.next().await {
            let Message::AdaptationRequested {
                file_id,
                source_path,
                destination_path,
                ..
            } = envelope.message
            else {
                continue;
            };
            let original = std::fs::read(&source_path).unwrap_or_default();
            let outcome = if original.starts_with(b"replace") {
                let mut rebuilt = b"rebuilt:".to_vec();
                rebuilt.extend_from_slice(&original);
                if std::fs::write(&destination_path, rebuilt).is_err() {
                    AdaptationOutcome::Failed
                } else {
                    AdaptationOutcome::Replace
                }
            } else if original.starts_with(b"fail") {
                AdaptationOutcome::Failed
            } else if original.starts_with(b"silent") {
                continue;
            } else {
                AdaptationOutcome::Unmodified
            };
            let _ = bus.publish(completion(file_id, outcome));
        }
    })
}

fn orchestrator(
    job: ArchiveJob,
    notifier: Arc<dyn OutcomeNotifier>,
    publisher: Arc<dyn RequestPublisher>,
) -> TestResult<ArchiveOrchestrator> {
    let reports = HtmlErrorReportGenerator::new(job.workspace().rebuilt_dir);
    Ok(ArchiveOrchestrator::new(
        job,
        Collaborators {
            files: Arc::new(LocalFileManager),
            archives: Arc::new(ZipArchiveManager::new()),
            reports: Arc::new(reports),
            publisher,
            notifier,
        },
        Metrics::new()?,
    ))
}

async fn archive_notifications(stream: &mut MessageStream) -> Vec<FileOutcome> {
    let mut outcomes = Vec::new();
    while let Ok(Some(envelope)) = timeout(Duration::from_millis(100), stream.next()).await {
        if let Message::ArchiveProcessed { outcome, .. } = envelope.message {
            outcomes.push(outcome);
        }
    }
    outcomes
}

#[tokio::test]
async fn mixed_outcomes_produce_rebuilt_archive() -> TestResult<()> {
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_secs(10));
    write_zip_fixture(
        &job.input_path,
        &[
            ("keep.txt", b"keep me"),
            ("docs/change.txt", b"replace me"),
            ("bad.bin", b"fail me"),
        ],
    )?;
    let workspace = job.workspace();
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let mut notifications = bus.subscribe(None);
    let worker = spawn_worker(&bus);
    let orchestrator = orchestrator(job, Arc::new(bus.clone()), Arc::new(bus.clone()))?;
    let listener = ResponseListener::spawn(
        bus.subscribe(None),
        orchestrator.collection(),
        orchestrator.cancellation(),
    );

    let outcome = orchestrator.process().await;
    worker.abort();

    let ProcessingOutcome::Completed { entries } = outcome else {
        return Err(format!("unexpected outcome: {outcome:?}").into());
    };
    assert_eq!(entries, 3);
    assert_eq!(timeout(Duration::from_secs(1), listener.join()).await?, 3);

    let archived: HashMap<_, _> = read_zip_entries(&output)?.into_iter().collect();
    assert_eq!(archived.len(), 3);
    assert_eq!(archived["keep.txt"], b"keep me");
    assert_eq!(archived["docs/change.txt"], b"rebuilt:replace me");
    let report = String::from_utf8(archived[ERROR_REPORT_FILE_NAME].clone())?;
    assert!(report.contains(&format!("{ARCHIVE_ID}/")));

    assert!(!workspace.original_dir.exists());
    assert!(!workspace.rebuilt_dir.exists());
    assert_eq!(
        archive_notifications(&mut notifications).await,
        vec![FileOutcome::Replace]
    );
    Ok(())
}

#[tokio::test]
async fn archive_larger_than_the_replay_ring_completes() -> TestResult<()> {
    const MEMBERS: usize = 1_500;
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_secs(60));
    let names: Vec<String> = (0..MEMBERS).map(|index| format!("dir/file-{index}.txt")).collect();
    let members: Vec<(&str, &[u8])> = names
        .iter()
        .map(|name| (name.as_str(), b"keep".as_slice()))
        .collect();
    write_zip_fixture(&job.input_path, &members)?;
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let worker = spawn_worker(&bus);
    let orchestrator = orchestrator(job, Arc::new(bus.clone()), Arc::new(bus.clone()))?;
    let listener = ResponseListener::spawn(
        bus.subscribe(None),
        orchestrator.collection(),
        orchestrator.cancellation(),
    );

    let outcome = orchestrator.process().await;
    worker.abort();

    let ProcessingOutcome::Completed { entries } = outcome else {
        return Err(format!("unexpected outcome: {outcome:?}").into());
    };
    assert_eq!(entries, MEMBERS);
    assert_eq!(timeout(Duration::from_secs(5), listener.join()).await?, MEMBERS);
    let archived = read_zip_entries(&output)?;
    assert_eq!(archived.len(), MEMBERS);
    assert!(archived.iter().all(|(_, contents)| contents == b"keep"));
    Ok(())
}

#[tokio::test]
async fn every_failure_appends_the_shared_report() -> TestResult<()> {
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_secs(10));
    write_zip_fixture(
        &job.input_path,
        &[("one.bin", b"fail one"), ("two.bin", b"fail two")],
    )?;
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let worker = spawn_worker(&bus);
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = orchestrator(
        job,
        Arc::clone(&notifier) as Arc<dyn OutcomeNotifier>,
        Arc::new(bus.clone()),
    )?;
    let _listener = ResponseListener::spawn(
        bus.subscribe(None),
        orchestrator.collection(),
        orchestrator.cancellation(),
    );

    let outcome = orchestrator.process().await;
    worker.abort();

    assert!(matches!(outcome, ProcessingOutcome::Completed { entries: 2 }));
    let entries = read_zip_entries(&output)?;
    assert!(entries.iter().all(|(name, _)| name == ERROR_REPORT_FILE_NAME));
    assert_eq!(entries.len(), 2);
    let last_report = String::from_utf8(entries[1].1.clone())?;
    assert_eq!(last_report.matches(&format!("{ARCHIVE_ID}/")).count(), 2);
    assert_eq!(notifier.sent().len(), 1);
    assert_eq!(notifier.sent()[0].outcome, FileOutcome::Replace);
    Ok(())
}

#[tokio::test]
async fn timeout_removes_all_state_and_stays_silent() -> TestResult<()> {
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_millis(200));
    write_zip_fixture(
        &job.input_path,
        &[("quick.txt", b"keep"), ("slow.txt", b"silent forever")],
    )?;
    let workspace = job.workspace();
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let mut notifications = bus.subscribe(None);
    let worker = spawn_worker(&bus);
    let orchestrator = orchestrator(job, Arc::new(bus.clone()), Arc::new(bus.clone()))?;
    let listener = ResponseListener::spawn(
        bus.subscribe(None),
        orchestrator.collection(),
        orchestrator.cancellation(),
    );

    let outcome = orchestrator.process().await;
    worker.abort();

    assert!(matches!(outcome, ProcessingOutcome::TimedOut { .. }));
    assert!(orchestrator.cancellation().is_cancelled());
    assert!(timeout(Duration::from_secs(1), listener.join()).await? <= 1);
    assert!(!output.exists());
    assert!(!workspace.original_dir.exists());
    assert!(!workspace.rebuilt_dir.exists());
    assert!(archive_notifications(&mut notifications).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn dispatch_failure_reports_error_once() -> TestResult<()> {
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_secs(10));
    write_zip_fixture(
        &job.input_path,
        &[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")],
    )?;
    let workspace = job.workspace();
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let publisher = Arc::new(ScriptedPublisher::failing_after(1));
    let orchestrator = orchestrator(
        job,
        Arc::clone(&notifier) as Arc<dyn OutcomeNotifier>,
        Arc::clone(&publisher) as Arc<dyn RequestPublisher>,
    )?;

    let outcome = orchestrator.process().await;

    assert!(matches!(
        outcome,
        ProcessingOutcome::Failed {
            error: ArchiveError::Dispatch { .. }
        }
    ));
    assert_eq!(publisher.requests().len(), 1);
    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].outcome, FileOutcome::Error);
    assert_eq!(sent[0].archive_file_id, ARCHIVE_ID);
    assert_eq!(sent[0].reply_to, "archive-replies");
    assert!(!output.exists());
    assert!(!workspace.original_dir.exists());
    assert!(!workspace.rebuilt_dir.exists());
    Ok(())
}

#[tokio::test]
async fn corrupt_input_fails_and_cleans_up() -> TestResult<()> {
    let temp = temp_dir()?;
    let job = job(temp.path(), Duration::from_secs(10));
    std::fs::write(&job.input_path, b"definitely not a zip")?;
    let workspace = job.workspace();
    let output = job.output_path.clone();

    let bus = MessageBus::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = orchestrator(
        job,
        Arc::clone(&notifier) as Arc<dyn OutcomeNotifier>,
        Arc::new(ScriptedPublisher::new()),
    )?;

    let outcome = orchestrator.process().await;

    assert!(matches!(
        outcome,
        ProcessingOutcome::Failed {
            error: ArchiveError::FsOps {
                operation: "extract.unpack",
                ..
            }
        }
    ));
    assert_eq!(notifier.sent().len(), 1);
    assert!(!LocalFileManager.file_exists(&output));
    assert!(!workspace.original_dir.exists());
    assert!(!workspace.rebuilt_dir.exists());
    assert!(job_input_untouched(temp.path())?);
    Ok(())
}

fn job_input_untouched(root: &Path) -> TestResult<bool> {
    Ok(std::fs::read(root.join("incoming.zip"))? == b"definitely not a zip")
}
