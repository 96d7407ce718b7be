#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Archive adaptation: extract an archive, send each member to an adaptation
//! worker, collect the replies, and assemble the rebuilt archive.
//!
//! Layout: `job.rs` (job, workspace, file mapping), `collection.rs` (outcome
//! hand-off), `dispatcher.rs` (requests), `listener.rs` (replies from the bus),
//! `consumer.rs` (archive assembly), `orchestrator.rs` (timeout, cleanup,
//! notification), `error.rs` (failures).

pub mod collection;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod listener;
pub mod orchestrator;

pub use collection::OutcomeCollection;
pub use consumer::ResponseConsumer;
pub use dispatcher::{DispatchStatus, RequestDispatcher};
pub use error::{ArchiveError, ArchiveResult, OutcomeError};
pub use job::{ArchiveJob, FileMapping, TempWorkspace, entry_name};
pub use listener::ResponseListener;
pub use orchestrator::{ArchiveOrchestrator, Collaborators, ProcessingOutcome, SHUTDOWN_GRACE};
