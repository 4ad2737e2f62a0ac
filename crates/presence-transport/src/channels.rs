//! Broadcast channel naming.
//!
//! Every conversation gets exactly one presence channel, named by the
//! configured prefix followed by the conversation id.

use presence_core::ConversationId;
use std::fmt;

/// Default prefix for presence channels
pub const DEFAULT_CHANNEL_PREFIX: &str = "typing:";

/// Name of a broadcast channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Channel for a conversation under the given prefix
    #[must_use]
    pub fn conversation(prefix: &str, conversation_id: &ConversationId) -> Self {
        Self(format!("{prefix}{conversation_id}"))
    }

    /// Channel with an arbitrary name
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the channel name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the conversation id from a channel name carrying `prefix`
    #[must_use]
    pub fn conversation_id(&self, prefix: &str) -> Option<ConversationId> {
        self.0
            .strip_prefix(prefix)
            .and_then(|id| ConversationId::new(id).ok())
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::custom(name)
    }
}
