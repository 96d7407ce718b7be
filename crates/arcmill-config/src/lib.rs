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

//! File and environment backed configuration for archive processing.
//!
//! Layout: `model.rs` (typed config models), `validate.rs` (parsing helpers),
//! `loader.rs` (`ConfigLoader` + `EnvSource`), `defaults.rs` (fallback values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use defaults::DEFAULT_CONFIG_FILE;
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, EnvSource, ProcessEnv};
pub use model::{ArchiveProcessorConfig, ConfigDocument, MessageBrokerConfig};
