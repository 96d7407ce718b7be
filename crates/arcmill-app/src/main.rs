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

//! Binary entrypoint that processes one archive and exits non-zero unless the
//! rebuilt archive was produced.

use arcmill_app::{AppResult, run_app};

/// Processes the configured archive and returns once it is done.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await.map(|_| ())
}
