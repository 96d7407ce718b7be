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

//! Filesystem collaborators used by archive processing.
//!
//! Layout: `files.rs` (raw filesystem), `archive.rs` (zip codec),
//! `report.rs` (HTML error report), `error.rs` (failures).

pub mod archive;
pub mod error;
pub mod files;
pub mod report;

pub use archive::{ArchiveManager, ZipArchiveManager, sanitize_archive_path};
pub use error::{FsOpsError, FsOpsResult};
pub use files::{FileManager, LocalFileManager};
pub use report::{ERROR_REPORT_FILE_NAME, ErrorReportGenerator, HtmlErrorReportGenerator};
