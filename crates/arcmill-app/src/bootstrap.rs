use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::worker::LocalWorker;
use arcmill_archive::{
    ArchiveJob, ArchiveOrchestrator, Collaborators, ProcessingOutcome, ResponseListener,
};
use arcmill_config::{ArchiveProcessorConfig, ConfigLoader};
use arcmill_events::MessageBus;
use arcmill_fsops::{HtmlErrorReportGenerator, LocalFileManager, ZipArchiveManager};
use arcmill_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tracing::{info, warn};

/// Dependencies required to bootstrap the archive processor.
pub(crate) struct BootstrapDependencies {
    logging: LoggingConfig<'static>,
    config: ArchiveProcessorConfig,
    bus: MessageBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = ConfigLoader::from_process()
            .load()
            .map_err(|err| AppError::config("config.load", err))?;
        let logging = LoggingConfig {
            format: LogFormat::from_name(config.log_format.as_deref()),
            ..LoggingConfig::default()
        };
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            logging,
            config,
            bus: MessageBus::new(),
            metrics,
        })
    }
}

/// Entry point for the archive processor run.
///
/// Returns the number of entries written to the output archive.
///
/// # Errors
///
/// Returns an error if configuration or telemetry setup fails, or if the archive could not
/// be processed within its budget.
pub async fn run_app() -> AppResult<usize> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies).await
}

/// Run sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<usize> {
    arcmill_telemetry::init_logging(&dependencies.logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("archive");

    let BootstrapDependencies {
        logging: _,
        config,
        bus,
        metrics,
    } = dependencies;

    info!(
        archive_file_id = %config.archive_file_id,
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        broker_host = %config.message_broker.host,
        broker_port = config.message_broker.port,
        broker_user = %config.message_broker.user,
        timeout_secs = config.processing_timeout.as_secs(),
        "archive processor starting"
    );

    let result = process_archive(&config, &bus, &metrics).await;
    match &result {
        Ok(entries) => info!(entries, "archive processor finished"),
        Err(err) => warn!(error = %err, "archive processor finished without output"),
    }
    result
}

/// Process the configured archive over `bus`.
///
/// A response listener is attached before the first request goes out. With
/// `local_worker` set, a passthrough worker answers requests in-process.
pub(crate) async fn process_archive(
    config: &ArchiveProcessorConfig,
    bus: &MessageBus,
    metrics: &Metrics,
) -> AppResult<usize> {
    let job = ArchiveJob::from_config(config);
    let archive_file_id = job.archive_file_id.clone();
    let reports = HtmlErrorReportGenerator::new(job.workspace().rebuilt_dir);
    let orchestrator = ArchiveOrchestrator::new(
        job,
        Collaborators {
            files: Arc::new(LocalFileManager),
            archives: Arc::new(ZipArchiveManager::new()),
            reports: Arc::new(reports),
            publisher: Arc::new(bus.clone()),
            notifier: Arc::new(bus.clone()),
        },
        metrics.clone(),
    );

    let cancel = orchestrator.cancellation();
    let listener =
        ResponseListener::spawn(bus.subscribe(None), orchestrator.collection(), cancel.clone());
    let worker = config.local_worker.then(|| LocalWorker::spawn(bus));

    let outcome = orchestrator.process().await;

    cancel.cancel();
    let delivered = listener.join().await;
    if let Some(worker) = worker {
        let answered = worker.stop().await;
        info!(answered, "local worker answered requests");
    }
    info!(delivered, outcome = outcome.label(), "archive run settled");

    match outcome {
        ProcessingOutcome::Completed { entries } => Ok(entries),
        ProcessingOutcome::Failed { error } => Err(AppError::Processing {
            archive_file_id,
            source: error,
        }),
        ProcessingOutcome::TimedOut { after } => Err(AppError::TimedOut {
            archive_file_id,
            after,
        }),
    }
}
