//! Presence client entry point.

use presence_common::{PresenceError, PresenceResult, PresenceSettings, TimingConfig};
use presence_core::{ConversationId, ParticipantId};
use presence_transport::{
    ChannelName, RedisTransport, SharedTransport, DEFAULT_CHANNEL_PREFIX,
};
use std::sync::Arc;
use std::time::Duration;

use crate::channel::TypingChannel;
use crate::registry::ChannelRegistry;

/// Throttle and decay windows applied to every channel a client opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub throttle_window: Duration,
    pub decay_window: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for ChannelOptions {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            throttle_window: timing.throttle_window(),
            decay_window: timing.decay_window(),
        }
    }
}

/// Opens typing channels over a shared transport.
///
/// At most one channel per conversation is live at a time.
pub struct PresenceClient {
    transport: SharedTransport,
    registry: Arc<ChannelRegistry>,
    options: ChannelOptions,
    channel_prefix: String,
}

impl PresenceClient {
    #[must_use]
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            registry: ChannelRegistry::new_shared(),
            options: ChannelOptions::default(),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ChannelOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_channel_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    /// Build a client over `transport` using loaded settings
    #[must_use]
    pub fn from_settings(transport: SharedTransport, settings: &PresenceSettings) -> Self {
        Self::new(transport)
            .with_options(ChannelOptions::from(&settings.timing))
            .with_channel_prefix(settings.channel_prefix.clone())
    }

    /// Connect to Redis as configured and build a client over it
    pub async fn connect(settings: &PresenceSettings) -> PresenceResult<Self> {
        let redis = settings.require_redis()?;
        let transport = RedisTransport::connect(redis, settings.subscription_buffer)
            .await
            .map_err(PresenceError::internal)?;

        tracing::info!(max_connections = redis.max_connections, "Presence transport connected");

        Ok(Self::from_settings(Arc::new(transport), settings))
    }

    #[must_use]
    pub fn options(&self) -> ChannelOptions {
        self.options
    }

    #[must_use]
    pub fn channel_prefix(&self) -> &str {
        &self.channel_prefix
    }

    /// Open the typing channel of a conversation, watching `peer_id`
    pub async fn open(
        &self,
        conversation_id: &str,
        self_id: &str,
        peer_id: &str,
    ) -> PresenceResult<TypingChannel> {
        let conversation = ConversationId::new(conversation_id)
            .map_err(|_| PresenceError::InvalidConversation(conversation_id.to_string()))?;
        let self_id = ParticipantId::new(self_id)?;
        let peer_id = ParticipantId::new(peer_id)?;

        self.open_with_ids(conversation, self_id, peer_id).await
    }

    pub async fn open_with_ids(
        &self,
        conversation: ConversationId,
        self_id: ParticipantId,
        peer_id: ParticipantId,
    ) -> PresenceResult<TypingChannel> {
        let registration = self
            .registry
            .claim(&conversation)
            .ok_or_else(|| PresenceError::ChannelAlreadyOpen(conversation.to_string()))?;

        let channel = ChannelName::conversation(&self.channel_prefix, &conversation);
        let subscription = match self.transport.subscribe(&channel).await {
            Ok(subscription) => subscription,
            Err(e) => {
                let err = PresenceError::subscribe(&channel, e);
                tracing::warn!(
                    conversation_id = %conversation,
                    code = err.error_code(),
                    error = %err,
                    "Failed to open presence channel"
                );
                // Registration drops here, so a retry can claim the slot again
                return Err(err);
            }
        };

        tracing::debug!(
            conversation_id = %conversation,
            self_id = %self_id,
            peer_id = %peer_id,
            channel = %channel,
            "Presence channel opened"
        );

        Ok(TypingChannel::spawn(
            conversation,
            self_id,
            peer_id,
            self.transport.clone(),
            subscription,
            registration,
            self.options,
        ))
    }

    /// Conversations that currently have a live channel
    #[must_use]
    pub fn open_conversations(&self) -> Vec<ConversationId> {
        self.registry.conversations()
    }

    #[must_use]
    pub fn is_open(&self, conversation: &ConversationId) -> bool {
        self.registry.is_open(conversation)
    }
}
