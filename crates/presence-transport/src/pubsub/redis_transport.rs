//! `BroadcastTransport` over Redis Pub/Sub.
//!
//! Outbound messages go through `Publisher`. Inbound messages arrive on the
//! shared `Subscriber` broadcast and are routed by channel name to every
//! `Subscription` of that channel. Redis echoes messages back to the
//! publishing process when it is subscribed to the same channel.

use async_trait::async_trait;
use dashmap::DashMap;
use presence_core::BroadcastEnvelope;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::pool::RedisPool;
use super::publisher::Publisher;
use super::subscriber::{Subscriber, SubscriberConfig};
use crate::channels::ChannelName;
use crate::transport::{
    BroadcastTransport, ReceivedMessage, Subscription, SubscriptionId, TransportResult,
};

struct Route {
    id: SubscriptionId,
    tx: mpsc::Sender<ReceivedMessage>,
}

type Routes = Arc<DashMap<String, Vec<Route>>>;

/// Redis-backed broadcast transport
pub struct RedisTransport {
    publisher: Publisher,
    subscriber: Subscriber,
    routes: Routes,
    subscription_buffer: usize,
    router: JoinHandle<()>,
}

impl RedisTransport {
    /// Connect using presence-common settings
    pub async fn connect(
        config: &presence_common::RedisConfig,
        subscription_buffer: usize,
    ) -> TransportResult<Self> {
        let pool = RedisPool::connect(config)?;
        pool.ping().await?;

        let subscriber = Subscriber::new(SubscriberConfig::from(config));
        Ok(Self::from_parts(
            Publisher::new(pool),
            subscriber,
            subscription_buffer,
        ))
    }

    /// Assemble from an existing publisher and subscriber
    #[must_use]
    pub fn from_parts(publisher: Publisher, subscriber: Subscriber, subscription_buffer: usize) -> Self {
        let routes: Routes = Arc::new(DashMap::new());
        let router = tokio::spawn(Self::route_loop(subscriber.receiver(), routes.clone()));

        Self {
            publisher,
            subscriber,
            routes,
            subscription_buffer: subscription_buffer.max(1),
            router,
        }
    }

    async fn route_loop(mut receiver: broadcast::Receiver<ReceivedMessage>, routes: Routes) {
        loop {
            match receiver.recv().await {
                Ok(message) => Self::route(&routes, &message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "Redis router lagged behind, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Redis router channel closed");
                    break;
                }
            }
        }
    }

    /// Entries leave `routes` only through `unsubscribe`, which also
    /// releases the Redis channel
    fn route(routes: &Routes, message: &ReceivedMessage) {
        let Some(targets) = routes.get(message.channel.as_str()) else {
            return;
        };

        for route in targets.iter() {
            if let Err(mpsc::error::TrySendError::Full(_)) = route.tx.try_send(message.clone()) {
                tracing::trace!(
                    channel = %message.channel,
                    subscription = %route.id,
                    "Subscription queue full, message dropped"
                );
            }
        }
    }

    /// `true` if `id` was routed on `channel`
    fn remove_route(&self, channel: &ChannelName, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.routes.alter(channel.as_str(), |_, mut targets| {
            let before = targets.len();
            targets.retain(|route| route.id != id);
            removed = targets.len() != before;
            targets
        });
        self.routes
            .remove_if(channel.as_str(), |_, targets| targets.is_empty());
        removed
    }

    /// Shut down the background subscriber
    pub async fn shutdown(&self) -> TransportResult<()> {
        self.routes.clear();
        self.subscriber.shutdown().await
    }
}

#[async_trait]
impl BroadcastTransport for RedisTransport {
    async fn subscribe(&self, channel: &ChannelName) -> TransportResult<Subscription> {
        let (tx, rx) = mpsc::channel(self.subscription_buffer);
        let id = SubscriptionId::new();
        self.routes
            .entry(channel.as_str().to_string())
            .or_default()
            .push(Route { id, tx });

        if let Err(e) = self.subscriber.subscribe(channel).await {
            self.remove_route(channel, id);
            return Err(e);
        }

        tracing::debug!(channel = %channel, subscription = %id, "Subscribed to channel");
        Ok(Subscription::new(id, channel.clone(), rx))
    }

    async fn send(&self, channel: &ChannelName, envelope: &BroadcastEnvelope) -> TransportResult<()> {
        self.publisher.publish(channel, envelope).await?;
        Ok(())
    }

    async fn unsubscribe(&self, channel: &ChannelName, id: SubscriptionId) -> TransportResult<()> {
        // Dropping the route ends the Subscription even if Redis is unreachable
        if !self.remove_route(channel, id) {
            return Ok(());
        }
        self.subscriber.unsubscribe(channel).await?;

        tracing::debug!(channel = %channel, subscription = %id, "Unsubscribed from channel");
        Ok(())
    }
}

impl Drop for RedisTransport {
    fn drop(&mut self) {
        self.router.abort();
    }
}
