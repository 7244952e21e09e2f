//! Host registry doubles.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tether_bridge::{HostError, HostListener, HostRegistry, HostResult, LocalHost, RegistrationId};
use tether_events::ChannelName;

#[derive(Debug, Clone)]
enum FailureMode {
    Unreachable,
    Rejected(String),
}

/// Host that fails every registration.
#[derive(Debug, Clone)]
pub struct FailingHost {
    mode: FailureMode,
    attempts: Arc<AtomicUsize>,
    removals: Arc<AtomicUsize>,
}

impl FailingHost {
    /// Host that behaves as if the transport were down.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::with_mode(FailureMode::Unreachable)
    }

    /// Host that refuses registrations with `reason`.
    #[must_use]
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::with_mode(FailureMode::Rejected(reason.into()))
    }

    fn with_mode(mode: FailureMode) -> Self {
        Self {
            mode,
            attempts: Arc::new(AtomicUsize::new(0)),
            removals: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of registration attempts received.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of removal calls received.
    #[must_use]
    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostRegistry for FailingHost {
    async fn listen(
        &self,
        channel: ChannelName,
        _listener: HostListener,
    ) -> HostResult<RegistrationId> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(match &self.mode {
            FailureMode::Unreachable => HostError::Unreachable {
                reason: "transport down".to_string(),
            },
            FailureMode::Rejected(reason) => HostError::Rejected {
                channel,
                reason: reason.clone(),
            },
        })
    }

    fn unlisten(&self, _channel: ChannelName, _registration: RegistrationId) -> bool {
        self.removals.fetch_add(1, Ordering::SeqCst);
        false
    }
}

/// [`LocalHost`] wrapper that counts calls across the host boundary.
#[derive(Debug, Clone, Default)]
pub struct CountingHost {
    inner: LocalHost,
    listens: Arc<AtomicUsize>,
    unlistens: Arc<AtomicUsize>,
    removed: Arc<AtomicUsize>,
}

impl CountingHost {
    /// Wrap a fresh [`LocalHost`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped host, for emitting envelopes.
    #[must_use]
    pub const fn host(&self) -> &LocalHost {
        &self.inner
    }

    /// Successful and failed `listen` calls.
    #[must_use]
    pub fn listens(&self) -> usize {
        self.listens.load(Ordering::SeqCst)
    }

    /// `unlisten` calls, including ones that removed nothing.
    #[must_use]
    pub fn unlistens(&self) -> usize {
        self.unlistens.load(Ordering::SeqCst)
    }

    /// `unlisten` calls that removed a registration.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostRegistry for CountingHost {
    async fn listen(
        &self,
        channel: ChannelName,
        listener: HostListener,
    ) -> HostResult<RegistrationId> {
        self.listens.fetch_add(1, Ordering::SeqCst);
        self.inner.listen(channel, listener).await
    }

    fn unlisten(&self, channel: ChannelName, registration: RegistrationId) -> bool {
        self.unlistens.fetch_add(1, Ordering::SeqCst);
        let removed = self.inner.unlisten(channel, registration);
        if removed {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }
}

/// [`LocalHost`] wrapper that stores each registration immediately but
/// acknowledges it only after `delay`, like a host across a slow IPC hop.
#[derive(Debug, Clone)]
pub struct DelayedAckHost {
    inner: LocalHost,
    delay: Duration,
    acknowledged: Arc<AtomicUsize>,
}

impl DelayedAckHost {
    /// Wrap a fresh [`LocalHost`] that acknowledges after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: LocalHost::new(),
            delay,
            acknowledged: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The wrapped host, for emitting envelopes.
    #[must_use]
    pub const fn host(&self) -> &LocalHost {
        &self.inner
    }

    /// Registrations whose acknowledgement reached the caller.
    #[must_use]
    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostRegistry for DelayedAckHost {
    async fn listen(
        &self,
        channel: ChannelName,
        listener: HostListener,
    ) -> HostResult<RegistrationId> {
        let registration = self.inner.listen(channel, listener).await?;
        tokio::time::sleep(self.delay).await;
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        Ok(registration)
    }

    fn unlisten(&self, channel: ChannelName, registration: RegistrationId) -> bool {
        self.inner.unlisten(channel, registration)
    }
}
