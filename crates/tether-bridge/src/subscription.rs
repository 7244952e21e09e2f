//! Handles returned to subscribers.
//!
//! # Design
//! - A subscription is created only after the host confirmed the registration;
//!   a failed registration never produces a handle.
//! - Cancellation is synchronous and idempotent; dropping the handle cancels.
//! - The active flag is shared with the host-side listener, so no listener
//!   call starts after `cancel` returns even if the host already dispatched
//!   the envelope. A host that drops the registration itself flips the same
//!   flag and the handle reports `Cancelled`.

use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use tether_events::ChannelName;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use crate::bridge::Counters;
use crate::host::{HostRegistry, RegistrationId};

/// Observable lifecycle of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Listener will be invoked for delivered envelopes.
    Active,
    /// Registration was removed; terminal.
    Cancelled,
}

/// One active registration on a host channel.
#[must_use = "dropping a subscription cancels it"]
pub struct Subscription {
    host: Arc<dyn HostRegistry>,
    channel: ChannelName,
    registration: RegistrationId,
    active: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl Subscription {
    pub(crate) fn new(
        host: Arc<dyn HostRegistry>,
        channel: ChannelName,
        registration: RegistrationId,
        active: Arc<AtomicBool>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            host,
            channel,
            registration,
            active,
            counters,
        }
    }

    /// Channel this subscription listens on.
    #[must_use]
    pub const fn channel(&self) -> ChannelName {
        self.channel
    }

    /// Host-assigned registration identifier.
    #[must_use]
    pub const fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        if self.is_active() {
            SubscriptionState::Active
        } else {
            SubscriptionState::Cancelled
        }
    }

    /// Whether the listener is still receiving payloads.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery and remove the host registration.
    ///
    /// Only the first call has an effect; later calls are no-ops, as is a call
    /// after the host retired the registration itself.
    pub fn cancel(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        let removed = self.host.unlisten(self.channel, self.registration);
        self.counters.record_cancelled();
        debug!(
            channel = %self.channel,
            registration = self.registration,
            removed,
            "subscription cancelled"
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Debug for Subscription {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("registration", &self.registration)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Pull-based view of a subscription: payloads queue until consumed.
///
/// Dropping the stream cancels the underlying subscription.
#[derive(Debug)]
#[must_use = "dropping a payload stream cancels its subscription"]
pub struct PayloadStream<T> {
    subscription: Subscription,
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> PayloadStream<T> {
    pub(crate) const fn new(
        subscription: Subscription,
        receiver: mpsc::UnboundedReceiver<T>,
    ) -> Self {
        Self {
            subscription,
            receiver,
        }
    }

    /// Receive the next payload in delivery order.
    ///
    /// Returns `None` once the stream is cancelled and drained, or when the
    /// host dropped the registration.
    pub async fn next(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Cancel the subscription. Payloads already queued remain readable.
    pub fn cancel(&mut self) {
        self.subscription.cancel();
        self.receiver.close();
    }

    /// The subscription backing this stream.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T> Unpin for PayloadStream<T> {}

impl<T> Stream for PayloadStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.receiver.poll_recv(cx)
    }
}
