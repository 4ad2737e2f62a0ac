//! In-process broadcast bus.
//!
//! Every client connects its own `InMemoryTransport` endpoint to a shared
//! `InMemoryBus`. Delivery is best-effort: a subscriber whose queue is full
//! misses the message.

use async_trait::async_trait;
use dashmap::DashMap;
use presence_core::BroadcastEnvelope;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channels::ChannelName;
use crate::transport::{
    BroadcastTransport, ReceivedMessage, Subscription, SubscriptionId, TransportError,
    TransportResult,
};

/// Default per-subscriber queue size
const DEFAULT_BUFFER: usize = 64;

struct BusSubscriber {
    endpoint: Uuid,
    id: SubscriptionId,
    tx: mpsc::Sender<ReceivedMessage>,
}

struct BusInner {
    /// Subscribers by channel name
    channels: DashMap<String, Vec<BusSubscriber>>,
    /// Deliver messages back to the sending endpoint
    self_echo: bool,
    buffer: usize,
}

/// Shared in-memory broadcast bus
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<BusInner>,
}

impl InMemoryBus {
    /// Create a bus without self-echo
    #[must_use]
    pub fn new() -> Self {
        Self::build(false, DEFAULT_BUFFER)
    }

    /// Create a bus that also delivers messages to their sender
    #[must_use]
    pub fn with_self_echo() -> Self {
        Self::build(true, DEFAULT_BUFFER)
    }

    /// Create a bus with a custom per-subscriber queue size
    #[must_use]
    pub fn with_buffer(buffer: usize) -> Self {
        Self::build(false, buffer.max(1))
    }

    fn build(self_echo: bool, buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: DashMap::new(),
                self_echo,
                buffer,
            }),
        }
    }

    /// Connect a new client endpoint
    #[must_use]
    pub fn connect(&self) -> InMemoryTransport {
        InMemoryTransport {
            endpoint: Uuid::new_v4(),
            bus: self.inner.clone(),
            fail_sends: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        }
    }

    /// Number of live subscriptions to a channel
    #[must_use]
    pub fn subscriber_count(&self, channel: &ChannelName) -> usize {
        self.inner
            .channels
            .get(channel.as_str())
            .map_or(0, |subscribers| subscribers.len())
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's connection to an `InMemoryBus`
pub struct InMemoryTransport {
    endpoint: Uuid,
    bus: Arc<BusInner>,
    fail_sends: AtomicBool,
    fail_subscribe: AtomicBool,
    sent: AtomicU64,
}

impl InMemoryTransport {
    /// Make subsequent sends fail, simulating a dropped connection
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent subscribes fail
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Number of messages this endpoint has successfully sent
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    fn remove_subscription(&self, channel: &ChannelName, id: SubscriptionId) {
        self.bus.channels.alter(channel.as_str(), |_, mut subscribers| {
            subscribers.retain(|s| s.id != id);
            subscribers
        });
        self.bus
            .channels
            .remove_if(channel.as_str(), |_, subscribers| subscribers.is_empty());
    }
}

#[async_trait]
impl BroadcastTransport for InMemoryTransport {
    async fn subscribe(&self, channel: &ChannelName) -> TransportResult<Subscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(format!(
                "subscribe to {channel} refused"
            )));
        }

        let (tx, rx) = mpsc::channel(self.bus.buffer);
        let id = SubscriptionId::new();
        self.bus
            .channels
            .entry(channel.as_str().to_string())
            .or_default()
            .push(BusSubscriber {
                endpoint: self.endpoint,
                id,
                tx,
            });

        tracing::debug!(
            channel = %channel,
            endpoint = %self.endpoint,
            subscription = %id,
            "Subscribed to channel"
        );

        Ok(Subscription::new(id, channel.clone(), rx))
    }

    async fn send(&self, channel: &ChannelName, envelope: &BroadcastEnvelope) -> TransportResult<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(format!(
                "send on {channel} refused"
            )));
        }

        let payload = envelope.to_json()?;
        let mut receivers = 0usize;

        if let Some(mut subscribers) = self.bus.channels.get_mut(channel.as_str()) {
            subscribers.retain(|subscriber| {
                if subscriber.endpoint == self.endpoint && !self.bus.self_echo {
                    return true;
                }
                let message = ReceivedMessage::new(channel.clone(), payload.clone());
                match subscriber.tx.try_send(message) {
                    Ok(()) => {
                        receivers += 1;
                        true
                    }
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::trace!(channel = %channel, "Subscriber queue full, message dropped");
                        true
                    }
                    // Receiver gone; prune it
                    Err(mpsc::error::TrySendError::Closed(_)) => false,
                }
            });
        }

        self.sent.fetch_add(1, Ordering::SeqCst);

        tracing::trace!(
            channel = %channel,
            event = %envelope.event,
            receivers = receivers,
            "Published event"
        );

        Ok(())
    }

    async fn unsubscribe(&self, channel: &ChannelName, id: SubscriptionId) -> TransportResult<()> {
        self.remove_subscription(channel, id);
        tracing::debug!(channel = %channel, subscription = %id, "Unsubscribed from channel");
        Ok(())
    }
}

impl Drop for InMemoryTransport {
    fn drop(&mut self) {
        let endpoint = self.endpoint;
        for mut subscribers in self.bus.channels.iter_mut() {
            subscribers.retain(|s| s.endpoint != endpoint);
        }
        self.bus.channels.retain(|_, subscribers| !subscribers.is_empty());
    }
}
