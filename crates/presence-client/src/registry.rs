//! Registry of conversations with a live presence channel.
//!
//! At most one channel may exist per conversation in a client, otherwise
//! every inbound event would be delivered twice.

use dashmap::DashSet;
use presence_core::ConversationId;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    open: DashSet<ConversationId>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Reserve a conversation; `None` if it already has a live channel
    #[must_use]
    pub fn claim(self: &Arc<Self>, conversation: &ConversationId) -> Option<Registration> {
        if !self.open.insert(conversation.clone()) {
            return None;
        }

        tracing::trace!(conversation_id = %conversation, "Presence channel registered");

        Some(Registration {
            registry: self.clone(),
            conversation: conversation.clone(),
        })
    }

    #[must_use]
    pub fn is_open(&self, conversation: &ConversationId) -> bool {
        self.open.contains(conversation)
    }

    /// Conversations with a live channel, sorted
    #[must_use]
    pub fn conversations(&self) -> Vec<ConversationId> {
        let mut conversations: Vec<_> = self.open.iter().map(|c| c.key().clone()).collect();
        conversations.sort();
        conversations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Claim on a conversation; released on drop
#[derive(Debug)]
pub struct Registration {
    registry: Arc<ChannelRegistry>,
    conversation: ConversationId,
}

impl Registration {
    #[must_use]
    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.open.remove(&self.conversation);
        tracing::trace!(conversation_id = %self.conversation, "Presence channel released");
    }
}
