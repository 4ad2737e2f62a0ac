//! Redis Pub/Sub publisher.

use presence_core::BroadcastEnvelope;
use redis::AsyncCommands;

use super::pool::RedisPool;
use crate::channels::ChannelName;
use crate::transport::TransportResult;

/// Redis Pub/Sub publisher
#[derive(Clone, Debug)]
pub struct Publisher {
    pool: RedisPool,
}

impl Publisher {
    /// Create a new publisher
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Publish an envelope to a channel, returning the number of receivers
    pub async fn publish(
        &self,
        channel: &ChannelName,
        envelope: &BroadcastEnvelope,
    ) -> TransportResult<u32> {
        let payload = envelope.to_json()?;
        self.publish_raw(channel, &payload).await
    }

    /// Publish a raw message to a channel
    pub async fn publish_raw(&self, channel: &ChannelName, message: &str) -> TransportResult<u32> {
        let mut conn = self.pool.get().await?;

        let receivers: u32 = conn.publish(channel.as_str(), message).await?;

        tracing::trace!(
            channel = %channel,
            receivers = receivers,
            "Published message"
        );

        Ok(receivers)
    }
}
