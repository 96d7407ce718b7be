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

//! Arcmill application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (config, telemetry, bus, and job wiring), `worker.rs`
//! (in-process passthrough worker), `error.rs` (failures surfaced to `main`).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;
/// In-process adaptation worker.
pub mod worker;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
