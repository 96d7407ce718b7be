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

//! Broker messages and the in-process bus that carries them.
//!
//! Layout: `payloads.rs` (typed messages and outcomes), `routing.rs`
//! (`MessageBus` and `MessageStream`), `ports.rs` (publisher/notifier seams),
//! `error.rs` (publish failures).

pub mod error;
pub mod payloads;
pub mod ports;
pub mod routing;

pub use error::{BusError, BusResult};
pub use payloads::{
    AdaptationOutcome, CorrelationId, DEFAULT_REPLAY_CAPACITY, FileOutcome, Message,
    MessageEnvelope, MessageId,
};
pub use ports::{
    AdaptationRequest, ArchiveNotification, OutcomeNotifier, RequestPublisher, completion,
};
pub use routing::{MessageBus, MessageStream};
