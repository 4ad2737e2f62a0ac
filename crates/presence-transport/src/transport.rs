//! Broadcast transport contract.
//!
//! A transport delivers each sent message, at most once and in no guaranteed
//! order, to the current subscribers of a named channel. Whether the sender
//! receives its own message back is implementation-defined.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use presence_core::BroadcastEnvelope;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::channels::ChannelName;

/// Error type for transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to get connection from pool: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Message received on a subscribed channel
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Channel the message was received on
    pub channel: ChannelName,
    /// Raw payload
    pub payload: String,
    /// When this client received it
    pub received_at: DateTime<Utc>,
}

impl ReceivedMessage {
    /// Create a message stamped with the current time
    #[must_use]
    pub fn new(channel: ChannelName, payload: String) -> Self {
        Self {
            channel,
            payload,
            received_at: Utc::now(),
        }
    }

    /// Parse the payload as a broadcast envelope
    pub fn envelope(&self) -> Result<BroadcastEnvelope, serde_json::Error> {
        BroadcastEnvelope::from_json(&self.payload)
    }
}

/// Identifies one `Subscription` among all subscriptions of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Stream of messages for one subscribed channel
///
/// Ends (`recv` returns `None`) once it is unsubscribed or the transport
/// shuts down. Several subscriptions of the same channel are independent.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    channel: ChannelName,
    rx: mpsc::Receiver<ReceivedMessage>,
}

impl Subscription {
    #[must_use]
    pub fn new(id: SubscriptionId, channel: ChannelName, rx: mpsc::Receiver<ReceivedMessage>) -> Self {
        Self { id, channel, rx }
    }

    /// Key to pass to `BroadcastTransport::unsubscribe`
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel this subscription listens on
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Wait for the next message
    pub async fn recv(&mut self) -> Option<ReceivedMessage> {
        self.rx.recv().await
    }

    /// Take a message if one is already queued
    pub fn try_recv(&mut self) -> Option<ReceivedMessage> {
        self.rx.try_recv().ok()
    }
}

/// Named broadcast-channel primitive
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Start receiving messages sent on `channel`
    async fn subscribe(&self, channel: &ChannelName) -> TransportResult<Subscription>;

    /// Deliver `envelope` to the current subscribers of `channel`
    async fn send(&self, channel: &ChannelName, envelope: &BroadcastEnvelope) -> TransportResult<()>;

    /// End the subscription `id` of `channel`.
    ///
    /// Other subscriptions of the same channel keep receiving. Unknown ids
    /// are ignored.
    async fn unsubscribe(&self, channel: &ChannelName, id: SubscriptionId) -> TransportResult<()>;
}

/// Shared transport handle
pub type SharedTransport = Arc<dyn BroadcastTransport>;
