//! Boundary to the host channel registry.
//!
//! # Design
//! - The host is addressed purely by channel name; payloads cross the boundary
//!   as raw JSON envelopes and are typed on this side.
//! - Registration is async (the host may live across an IPC hop); removal is
//!   synchronous so cancellation never suspends.
//! - Every registered handler travels with the liveness flag of its
//!   subscription. A retired listener is never invoked, and hosts drop it on
//!   sight, whichever side retired it.

use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tether_events::{ChannelName, RawEnvelope};
use thiserror::Error;

/// Identifier the host assigns to a single registration.
pub type RegistrationId = u64;

/// Callback the host invokes for every envelope delivered on a channel.
pub type RawHandler = Arc<dyn Fn(RawEnvelope) + Send + Sync>;

/// A handler as stored by the host, paired with its liveness flag.
///
/// Clones share the flag. Once retired, a listener stays retired.
#[derive(Clone)]
pub struct HostListener {
    handler: RawHandler,
    active: Arc<AtomicBool>,
}

impl HostListener {
    /// Wrap `handler` in a live listener.
    #[must_use]
    pub fn new(handler: RawHandler) -> Self {
        Self::with_flag(handler, Arc::new(AtomicBool::new(true)))
    }

    pub(crate) const fn with_flag(handler: RawHandler, active: Arc<AtomicBool>) -> Self {
        Self { handler, active }
    }

    /// Whether the listener still accepts envelopes.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop all further delivery. Subscriptions sharing the flag report
    /// themselves cancelled.
    pub fn retire(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Invoke the handler unless the listener is retired.
    ///
    /// Returns whether the handler ran.
    pub fn deliver(&self, envelope: RawEnvelope) -> bool {
        if !self.is_active() {
            return false;
        }
        (self.handler)(envelope);
        true
    }
}

impl Debug for HostListener {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HostListener")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Failures reported by a host registry.
#[derive(Debug, Error)]
pub enum HostError {
    /// The host could not be reached.
    #[error("host registry unreachable")]
    Unreachable {
        /// Transport-level detail.
        reason: String,
    },
    /// The host refused the registration.
    #[error("host registry rejected the registration")]
    Rejected {
        /// Channel the registration targeted.
        channel: ChannelName,
        /// Reason supplied by the host.
        reason: String,
    },
    /// The host has shut down and accepts no further work.
    #[error("host registry is closed")]
    Closed,
    /// A payload could not be encoded for delivery.
    #[error("failed to encode payload")]
    Encode {
        /// Channel the payload was destined for.
        channel: ChannelName,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

/// Result alias for host registry operations.
pub type HostResult<T> = Result<T, HostError>;

/// Registry of channel listeners maintained by the host process.
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Register `listener` for envelopes delivered on `channel`.
    ///
    /// Every call creates a new, independent registration. Deliveries go
    /// through [`HostListener::deliver`]; a listener found retired may be
    /// dropped without an [`HostRegistry::unlisten`] call. A host that drops
    /// registrations on its own (shutdown, transport loss) retires them.
    ///
    /// # Errors
    ///
    /// Returns an error when the host is unreachable or refuses the request.
    /// No registration exists in that case.
    async fn listen(
        &self,
        channel: ChannelName,
        listener: HostListener,
    ) -> HostResult<RegistrationId>;

    /// Remove a registration created by [`HostRegistry::listen`].
    ///
    /// Returns `true` when a registration was removed; unknown identifiers are
    /// ignored.
    fn unlisten(&self, channel: ChannelName, registration: RegistrationId) -> bool;
}
