//! Presence error types
//!
//! Unified error handling for the presence client. Every variant is
//! recoverable from the application's point of view: the worst outcome is
//! a missing typing indicator.

use presence_core::DomainError;
use std::fmt;

use crate::config::ConfigError;

/// Presence-wide error type
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    // Validation errors
    #[error("Invalid conversation: {0}")]
    InvalidConversation(String),

    // Lifecycle errors
    #[error("A presence channel is already open for conversation {0}")]
    ChannelAlreadyOpen(String),

    #[error("Presence channel is closed")]
    ChannelClosed,

    // Transport errors
    #[error("Failed to subscribe to {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    #[error("Failed to send on {channel}: {reason}")]
    Send { channel: String, reason: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl PresenceError {
    /// Get error code for diagnostics
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConversation(_) => "INVALID_CONVERSATION",
            Self::ChannelAlreadyOpen(_) => "CHANNEL_ALREADY_OPEN",
            Self::ChannelClosed => "CHANNEL_CLOSED",
            Self::Subscribe { .. } => "SUBSCRIBE_FAILED",
            Self::Send { .. } => "SEND_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Domain(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the failed operation (e.g. reopen the channel)
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Subscribe { .. } | Self::Send { .. } | Self::ChannelClosed
        )
    }

    /// Create a subscribe error for a channel
    pub fn subscribe(channel: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Subscribe {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a send error for a channel
    pub fn send(channel: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Send {
            channel: channel.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

/// Result type alias for presence operations
pub type PresenceResult<T> = Result<T, PresenceError>;
