//! In-process host registry.
//!
//! # Design
//! - One registration table per host, guarded by a single mutex.
//! - Handlers are cloned out of the table before they run, so listeners may
//!   subscribe or cancel from inside a callback.
//! - Retired listeners are pruned whenever their channel is touched; closing
//!   the host retires every listener it held.
//! - The transport form feeds a bounded queue drained by one dispatcher task,
//!   which preserves emit order for the whole host.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tether_events::{Channel, ChannelName, EventEnvelope, EventId, RawEnvelope};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::host::{HostError, HostListener, HostRegistry, HostResult, RegistrationId};

type Table = HashMap<ChannelName, Vec<Registration>>;

struct Registration {
    id: RegistrationId,
    listener: HostListener,
}

#[derive(Default)]
struct HostInner {
    table: Mutex<Table>,
    next_registration: AtomicU64,
    next_event: AtomicU64,
    closed: AtomicBool,
}

impl HostInner {
    fn next_event_id(&self) -> EventId {
        self.next_event
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1)
    }

    fn lock_table(&self) -> MutexGuard<'_, Table> {
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Live listeners on `channel`, in registration order.
    fn live_listeners(&self, channel: ChannelName) -> Vec<HostListener> {
        let mut table = self.lock_table();
        let Some(registrations) = table.get_mut(&channel) else {
            return Vec::new();
        };
        let (live, retired): (Vec<_>, Vec<_>) = std::mem::take(registrations)
            .into_iter()
            .partition(|registration| registration.listener.is_active());
        let listeners = live
            .iter()
            .map(|registration| registration.listener.clone())
            .collect();
        if live.is_empty() {
            table.remove(&channel);
        } else {
            *registrations = live;
        }
        drop(table);
        // Handlers may own subscriptions; drop them outside the lock.
        drop(retired);
        listeners
    }
}

/// Host registry living in the current process.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct LocalHost {
    inner: Arc<HostInner>,
}

impl LocalHost {
    /// Construct an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `payload` and deliver it on `C`'s channel.
    ///
    /// Returns the number of handlers invoked.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Encode`] if the payload cannot be serialised.
    pub fn emit<C: Channel>(&self, payload: &C::Payload) -> HostResult<usize> {
        let value = encode_payload::<C>(payload)?;
        Ok(self.emit_raw(C::NAME, value))
    }

    /// Deliver an untyped payload on `channel`, assigning the next event id.
    pub fn emit_raw(&self, channel: ChannelName, payload: Value) -> usize {
        let envelope = EventEnvelope::new(self.inner.next_event_id(), channel, payload);
        self.deliver(envelope)
    }

    /// Invoke every handler registered on the envelope's channel, in
    /// registration order. Returns the number of handlers invoked.
    pub fn deliver(&self, envelope: RawEnvelope) -> usize {
        let listeners = self.inner.live_listeners(envelope.channel);
        trace!(
            channel = %envelope.channel,
            event_id = envelope.id,
            listeners = listeners.len(),
            "delivering envelope"
        );
        listeners
            .iter()
            .filter(|listener| listener.deliver(envelope.clone()))
            .count()
    }

    /// Number of live registrations on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: ChannelName) -> usize {
        self.inner.live_listeners(channel).len()
    }

    /// Close the registry: retire and drop every registration, refuse new
    /// ones.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained = std::mem::take(&mut *self.inner.lock_table());
        for registration in drained.values().flatten() {
            registration.listener.retire();
        }
        debug!(channels = drained.len(), "local host closed");
        drop(drained);
    }

    /// Whether [`LocalHost::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Spawn the dispatcher task and return the transport sender feeding it.
    ///
    /// The task exits once every [`HostSender`] clone has been dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn spawn_dispatcher(&self, capacity: usize) -> (HostSender, JoinHandle<()>) {
        let capacity = capacity.max(1);
        let (sender, mut receiver) = mpsc::channel::<RawEnvelope>(capacity);
        let host = self.clone();
        let task = tokio::spawn(async move {
            info!(capacity, "host dispatcher started");
            let mut dispatched = 0_u64;
            while let Some(envelope) = receiver.recv().await {
                host.deliver(envelope);
                dispatched = dispatched.saturating_add(1);
            }
            info!(dispatched, "host dispatcher stopped");
        });
        let sender = HostSender {
            sender,
            inner: Arc::clone(&self.inner),
        };
        (sender, task)
    }
}

impl Debug for LocalHost {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let channels = self.inner.lock_table().len();
        formatter
            .debug_struct("LocalHost")
            .field("channels", &channels)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl HostRegistry for LocalHost {
    async fn listen(
        &self,
        channel: ChannelName,
        listener: HostListener,
    ) -> HostResult<RegistrationId> {
        let mut table = self.inner.lock_table();
        if self.is_closed() {
            return Err(HostError::Closed);
        }
        let id = self
            .inner
            .next_registration
            .fetch_add(1, Ordering::Relaxed)
            .saturating_add(1);
        table
            .entry(channel)
            .or_default()
            .push(Registration { id, listener });
        drop(table);
        debug!(%channel, registration = id, "listener registered");
        Ok(id)
    }

    fn unlisten(&self, channel: ChannelName, registration: RegistrationId) -> bool {
        // Removed handlers are dropped after the lock is released; they may own
        // subscriptions whose drop re-enters this method.
        let removed = {
            let mut table = self.inner.lock_table();
            let Some(registrations) = table.get_mut(&channel) else {
                return false;
            };
            let removed = registrations
                .iter()
                .position(|entry| entry.id == registration)
                .map(|index| registrations.remove(index));
            if registrations.is_empty() {
                table.remove(&channel);
            }
            removed
        };
        removed.is_some()
    }
}

/// Transport handle that queues envelopes for the dispatcher task.
#[derive(Clone)]
pub struct HostSender {
    sender: mpsc::Sender<RawEnvelope>,
    inner: Arc<HostInner>,
}

impl HostSender {
    /// Encode `payload` and queue it on `C`'s channel.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Encode`] for unserialisable payloads and
    /// [`HostError::Closed`] once the dispatcher has stopped.
    pub async fn send<C: Channel>(&self, payload: &C::Payload) -> HostResult<()> {
        let value = encode_payload::<C>(payload)?;
        self.send_raw(C::NAME, value).await
    }

    /// Queue an untyped payload on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] once the dispatcher has stopped.
    pub async fn send_raw(&self, channel: ChannelName, payload: Value) -> HostResult<()> {
        let envelope = EventEnvelope::new(self.inner.next_event_id(), channel, payload);
        self.forward(envelope).await
    }

    /// Queue a pre-built envelope unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Closed`] once the dispatcher has stopped.
    pub async fn forward(&self, envelope: RawEnvelope) -> HostResult<()> {
        self.sender
            .send(envelope)
            .await
            .map_err(|_| HostError::Closed)
    }
}

fn encode_payload<C: Channel>(payload: &C::Payload) -> HostResult<Value> {
    serde_json::to_value(payload).map_err(|source| HostError::Encode {
        channel: C::NAME,
        source,
    })
}
