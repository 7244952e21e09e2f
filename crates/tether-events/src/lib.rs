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

//! Channel taxonomy and payload schemas for host-emitted events.
//!
//! The host process exposes a fixed set of named channels. Each channel is
//! described by a zero-sized marker implementing [`Channel`], which binds the
//! wire name to the payload type at compile time. Envelopes wrap payloads with
//! host metadata before delivery.
//!
//! Layout: `channels.rs` (channel names and markers), `payloads.rs` (payload
//! schemas and the envelope), `error.rs` (name parsing errors).

pub mod channels;
pub mod error;
pub mod payloads;

pub use channels::{
    AppServerEvents, Channel, ChannelName, DictationDownload, DictationEvents, TerminalOutputs,
    UpdaterCheck,
};
pub use error::UnknownChannel;
pub use payloads::{
    AppServerEvent, AppServerMessage, DictationDownloadProgress, DictationEvent,
    DictationModelState, DictationModelStatus, DictationSessionState, EventEnvelope, EventId,
    RawEnvelope, TerminalOutput,
};
