//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::entities::MessageStatus;

/// Domain layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Conversation id must not be empty")]
    InvalidConversationId,

    #[error("Participant id must not be empty")]
    InvalidParticipantId,

    // =========================================================================
    // Business Rule Violations
    // =========================================================================
    #[error("Message status cannot move from {from} back to {to}")]
    StatusRegression {
        from: MessageStatus,
        to: MessageStatus,
    },
}

impl DomainError {
    /// Get an error code string for diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConversationId => "INVALID_CONVERSATION_ID",
            Self::InvalidParticipantId => "INVALID_PARTICIPANT_ID",
            Self::StatusRegression { .. } => "STATUS_REGRESSION",
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidConversationId | Self::InvalidParticipantId
        )
    }
}
