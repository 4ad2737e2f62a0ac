//! # presence-core
//!
//! Domain layer for chat typing presence: conversation and participant
//! identifiers, the typing event carried over the wire, and the message
//! delivery status shown next to it.
//! This crate has zero dependencies on infrastructure (transport, runtime, etc.).

pub mod entities;
pub mod error;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::MessageStatus;
pub use error::DomainError;
pub use events::{BroadcastEnvelope, InboundTypingEvent, TypingEvent, TYPING_EVENT};
pub use value_objects::{ConversationId, ParticipantId};
