//! Span helpers for the process and for individual archive jobs.
//!
//! # Design
//! - Provides an application-level span guard so every log line carries mode/build info.
//! - Job spans carry the archive identifier so interleaved jobs stay separable.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(mode: impl Into<String>) -> Self {
        let mode = mode.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", mode = %mode, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span covering one archive-processing run.
#[must_use]
pub fn job_span(archive_file_id: &str) -> Span {
    tracing::info_span!("archive_job", archive_file_id = %archive_file_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_context_guard_enters_and_drops() {
        let guard = GlobalContextGuard::new("test");
        drop(guard);
    }

    #[test]
    fn job_span_can_be_entered() {
        let span = job_span("archive-1");
        let _entered = span.enter();
    }
}
