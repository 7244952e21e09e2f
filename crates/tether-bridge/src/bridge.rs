//! Typed subscription adapter over a host registry.
//!
//! # Design
//! - One generic registration path; every channel-specific entry point only
//!   binds the payload type.
//! - Payloads are decoded at the boundary. Envelopes that do not match the
//!   channel's static shape are dropped, logged and counted; listeners never
//!   observe an ill-typed value.
//! - No buffering in the callback form: each envelope is one listener call on
//!   the host's delivery thread.
//! - A registration that is abandoned before the host acknowledges it is
//!   retired, so dropping a pending subscribe future leaves no live listener.

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tether_events::{
    AppServerEvent, AppServerEvents, Channel, DictationDownload, DictationEvent, DictationEvents,
    DictationModelStatus, RawEnvelope, TerminalOutput, TerminalOutputs, UpdaterCheck,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostListener, HostRegistry, RawHandler};
use crate::subscription::{PayloadStream, Subscription};

/// Point-in-time counters for a [`Bridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    /// Successful host registrations.
    pub registered: u64,
    /// Subscriptions cancelled (explicitly or by drop).
    pub cancelled: u64,
    /// Payloads accepted by listeners. A stream counts a payload only once
    /// it is queued.
    pub delivered: u64,
    /// Envelopes dropped because they failed boundary validation.
    pub malformed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    registered: AtomicU64,
    cancelled: AtomicU64,
    delivered: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            registered: self.registered.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Client-side entry point for typed channel subscriptions.
///
/// Cloning is cheap and shares the host handle and counters.
#[derive(Clone)]
pub struct Bridge {
    host: Arc<dyn HostRegistry>,
    counters: Arc<Counters>,
}

impl Bridge {
    /// Wrap a host registry.
    #[must_use]
    pub fn new<H: HostRegistry + 'static>(host: H) -> Self {
        Self::from_shared(Arc::new(host))
    }

    /// Wrap an already shared host registry.
    #[must_use]
    pub fn from_shared(host: Arc<dyn HostRegistry>) -> Self {
        Self {
            host,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Register `listener` for every payload delivered on channel `C`.
    ///
    /// Each call performs exactly one host registration; two calls yield two
    /// independent subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host rejects or cannot
    /// fulfil the request. No registration is left behind.
    pub async fn subscribe<C, F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        C: Channel,
        F: Fn(C::Payload) + Send + Sync + 'static,
    {
        register::<C, _>(&self.host, &self.counters, accept_all(listener)).await
    }

    /// Subscribe to channel `C` and consume payloads by pulling from a stream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn stream<C: Channel>(&self) -> BridgeResult<PayloadStream<C::Payload>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink = move |payload: C::Payload| sender.send(payload).is_ok();
        let subscription = register::<C, _>(&self.host, &self.counters, sink).await?;
        Ok(PayloadStream::new(subscription, receiver))
    }

    /// Listen for app-server events.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn subscribe_app_server_event<F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        F: Fn(AppServerEvent) + Send + Sync + 'static,
    {
        self.subscribe::<AppServerEvents, F>(listener).await
    }

    /// Listen for dictation model download status.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn subscribe_dictation_download<F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        F: Fn(DictationModelStatus) + Send + Sync + 'static,
    {
        self.subscribe::<DictationDownload, F>(listener).await
    }

    /// Listen for dictation session events.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn subscribe_dictation_event<F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        F: Fn(DictationEvent) + Send + Sync + 'static,
    {
        self.subscribe::<DictationEvents, F>(listener).await
    }

    /// Listen for terminal output chunks.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn subscribe_terminal_output<F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        F: Fn(TerminalOutput) + Send + Sync + 'static,
    {
        self.subscribe::<TerminalOutputs, F>(listener).await
    }

    /// Listen for update-check pings. The listener takes no arguments.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Registration`] when the host registration fails.
    pub async fn subscribe_updater_check<F>(&self, listener: F) -> BridgeResult<Subscription>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe::<UpdaterCheck, _>(move |()| listener()).await
    }

    /// Snapshot of the registration and delivery counters.
    #[must_use]
    pub fn stats(&self) -> BridgeStats {
        self.counters.snapshot()
    }
}

/// Register `listener` on channel `C` of `host` without constructing a
/// [`Bridge`].
///
/// Registrations made here are not reflected in any [`BridgeStats`]; keep a
/// [`Bridge`] when the counters matter.
///
/// # Errors
///
/// Returns [`BridgeError::Registration`] when the host registration fails.
pub async fn subscribe<C, F>(host: Arc<dyn HostRegistry>, listener: F) -> BridgeResult<Subscription>
where
    C: Channel,
    F: Fn(C::Payload) + Send + Sync + 'static,
{
    Bridge::from_shared(host).subscribe::<C, F>(listener).await
}

/// Retires a listener handed to the host unless the registration completes.
///
/// Dropping a subscribe future mid-`listen` drops this guard, which leaves
/// the host holding an inert listener that it prunes on its next delivery.
struct PendingRegistration {
    listener: HostListener,
    armed: bool,
}

impl PendingRegistration {
    const fn new(listener: HostListener) -> Self {
        Self {
            listener,
            armed: true,
        }
    }

    fn confirm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRegistration {
    fn drop(&mut self) {
        if self.armed {
            self.listener.retire();
            debug!("registration did not complete; listener retired");
        }
    }
}

fn accept_all<T, F>(listener: F) -> impl Fn(T) -> bool + Send + Sync + 'static
where
    F: Fn(T) + Send + Sync + 'static,
{
    move |payload| {
        listener(payload);
        true
    }
}

async fn register<C, S>(
    host: &Arc<dyn HostRegistry>,
    counters: &Arc<Counters>,
    sink: S,
) -> BridgeResult<Subscription>
where
    C: Channel,
    S: Fn(C::Payload) -> bool + Send + Sync + 'static,
{
    let active = Arc::new(AtomicBool::new(true));
    let listener = HostListener::with_flag(
        envelope_handler::<C, S>(Arc::clone(counters), sink),
        Arc::clone(&active),
    );
    let pending = PendingRegistration::new(listener.clone());

    let registration = host.listen(C::NAME, listener).await.map_err(|source| {
        warn!(channel = %C::NAME, error = %source, "channel registration failed");
        BridgeError::Registration {
            channel: C::NAME,
            source,
        }
    })?;

    pending.confirm();
    counters.registered.fetch_add(1, Ordering::Relaxed);
    debug!(channel = %C::NAME, registration, "subscription active");
    Ok(Subscription::new(
        Arc::clone(host),
        C::NAME,
        registration,
        active,
        Arc::clone(counters),
    ))
}

fn envelope_handler<C, S>(counters: Arc<Counters>, sink: S) -> RawHandler
where
    C: Channel,
    S: Fn(C::Payload) -> bool + Send + Sync + 'static,
{
    Arc::new(move |envelope: RawEnvelope| {
        match unwrap_envelope::<C>(envelope) {
            Ok(payload) => {
                if sink(payload) {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(error) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %error,
                    cause = ?error.source().map(|cause| cause.to_string()),
                    "dropping envelope"
                );
            }
        }
    })
}

fn unwrap_envelope<C: Channel>(envelope: RawEnvelope) -> BridgeResult<C::Payload> {
    if envelope.channel != C::NAME {
        return Err(BridgeError::Misrouted {
            expected: C::NAME,
            actual: envelope.channel,
            event_id: envelope.id,
        });
    }
    let event_id = envelope.id;
    C::decode(envelope.into_payload()).map_err(|source| BridgeError::MalformedPayload {
        channel: C::NAME,
        event_id,
        source,
    })
}
