//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes counters for the dispatch/collect/assemble stages of archive processing.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{TelemetryError, TelemetryResult};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    files_dispatched_total: IntCounter,
    adaptation_outcomes_total: IntCounterVec,
    archive_entries_appended_total: IntCounter,
    archives_processed_total: IntCounterVec,
    active_archives: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Files published to adaptation workers.
    pub files_dispatched_total: u64,
    /// Entries appended to output archives.
    pub archive_entries_appended_total: u64,
    /// Archives currently being processed.
    pub active_archives: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let files_dispatched_total = build(
            "files_dispatched_total",
            IntCounter::with_opts(Opts::new(
                "files_dispatched_total",
                "Files published for adaptation",
            )),
        )?;
        let adaptation_outcomes_total = build(
            "adaptation_outcomes_total",
            IntCounterVec::new(
                Opts::new(
                    "adaptation_outcomes_total",
                    "Adaptation outcomes consumed by kind",
                ),
                &["outcome"],
            ),
        )?;
        let archive_entries_appended_total = build(
            "archive_entries_appended_total",
            IntCounter::with_opts(Opts::new(
                "archive_entries_appended_total",
                "Entries appended to rebuilt archives",
            )),
        )?;
        let archives_processed_total = build(
            "archives_processed_total",
            IntCounterVec::new(
                Opts::new(
                    "archives_processed_total",
                    "Archive runs finished by result",
                ),
                &["result"],
            ),
        )?;
        let active_archives = build(
            "active_archives",
            IntGauge::with_opts(Opts::new(
                "active_archives",
                "Archives currently being processed",
            )),
        )?;

        register(&registry, "files_dispatched_total", &files_dispatched_total)?;
        register(
            &registry,
            "adaptation_outcomes_total",
            &adaptation_outcomes_total,
        )?;
        register(
            &registry,
            "archive_entries_appended_total",
            &archive_entries_appended_total,
        )?;
        register(
            &registry,
            "archives_processed_total",
            &archives_processed_total,
        )?;
        register(&registry, "active_archives", &active_archives)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                files_dispatched_total,
                adaptation_outcomes_total,
                archive_entries_appended_total,
                archives_processed_total,
                active_archives,
            }),
        })
    }

    /// Increment the dispatched file counter.
    pub fn inc_file_dispatched(&self) {
        self.inner.files_dispatched_total.inc();
    }

    /// Increment the consumed outcome counter for the given outcome label.
    pub fn inc_outcome(&self, outcome: &str) {
        self.inner
            .adaptation_outcomes_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the appended archive entry counter.
    pub fn inc_entry_appended(&self) {
        self.inner.archive_entries_appended_total.inc();
    }

    /// Record a finished archive run with the given result label.
    pub fn inc_archive_result(&self, result: &str) {
        self.inner
            .archives_processed_total
            .with_label_values(&[result])
            .inc();
    }

    /// Mark an archive run as started.
    pub fn archive_started(&self) {
        self.inner.active_archives.inc();
    }

    /// Mark an archive run as finished.
    pub fn archive_finished(&self) {
        self.inner.active_archives.dec();
    }

    /// Count of finished archive runs for the given result label.
    #[must_use]
    pub fn archive_result_count(&self, result: &str) -> u64 {
        self.inner
            .archives_processed_total
            .with_label_values(&[result])
            .get()
    }

    /// Count of consumed outcomes for the given outcome label.
    #[must_use]
    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.inner
            .adaptation_outcomes_total
            .with_label_values(&[outcome])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_dispatched_total: self.inner.files_dispatched_total.get(),
            archive_entries_appended_total: self.inner.archive_entries_appended_total.get(),
            active_archives: self.inner.active_archives.get(),
        }
    }
}

fn build<C>(name: &'static str, built: prometheus::Result<C>) -> TelemetryResult<C> {
    built.map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> TelemetryResult<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn counters_track_pipeline_stages() -> Result<(), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        metrics.inc_file_dispatched();
        metrics.inc_file_dispatched();
        metrics.inc_outcome("replace");
        metrics.inc_entry_appended();
        metrics.archive_started();
        metrics.inc_archive_result("replace");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_dispatched_total, 2);
        assert_eq!(snapshot.archive_entries_appended_total, 1);
        assert_eq!(snapshot.active_archives, 1);
        assert_eq!(metrics.outcome_count("replace"), 1);
        assert_eq!(metrics.archive_result_count("replace"), 1);
        assert_eq!(metrics.archive_result_count("error"), 0);

        metrics.archive_finished();
        assert_eq!(metrics.snapshot().active_archives, 0);
        Ok(())
    }

    #[test]
    fn render_exposes_registered_collectors() -> Result<(), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        metrics.inc_outcome("failed");
        let rendered = metrics.render()?;
        assert!(rendered.contains("adaptation_outcomes_total"));
        assert!(rendered.contains("files_dispatched_total"));
        Ok(())
    }

    #[test]
    fn snapshot_serializes() -> Result<(), Box<dyn Error>> {
        let metrics = Metrics::new()?;
        let value = serde_json::to_value(metrics.snapshot())?;
        assert_eq!(value["files_dispatched_total"], 0);
        Ok(())
    }
}
