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

//! Typed subscriptions over host-emitted event channels.
//!
//! A [`Bridge`] registers listeners with a [`HostRegistry`] and hands them
//! decoded payloads instead of raw envelopes. Each channel from
//! [`tether_events`] has a dedicated `subscribe_*` method; all of them go
//! through the same generic [`Bridge::subscribe`].
//!
//! Layout: `bridge.rs` (adapter and channel entry points), `subscription.rs`
//! (handles and payload streams), `host.rs` (host boundary trait), `local.rs`
//! (in-process host and dispatcher), `config.rs` (environment settings),
//! `error.rs` (bridge errors).

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod local;
pub mod subscription;

pub use bridge::{Bridge, BridgeStats, subscribe};
pub use config::{BridgeConfig, ConfigError, ConfigResult, bootstrap_from_env};
pub use error::{BridgeError, BridgeResult};
pub use host::{HostError, HostListener, HostRegistry, HostResult, RawHandler, RegistrationId};
pub use local::{HostSender, LocalHost};
pub use subscription::{PayloadStream, Subscription, SubscriptionState};
