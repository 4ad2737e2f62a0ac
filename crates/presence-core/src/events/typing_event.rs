//! Typing event and the broadcast envelope that wraps it on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::ParticipantId;

/// Broadcast event name used for typing signals
pub const TYPING_EVENT: &str = "typing";

/// Envelope for every message sent on a broadcast channel
///
/// ```json
/// { "event": "typing", "payload": { "senderId": "u2", "isTyping": true } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// Event name (e.g., "typing")
    pub event: String,
    /// Event payload
    pub payload: serde_json::Value,
}

impl BroadcastEnvelope {
    /// Create a new envelope
    #[must_use]
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Whether this envelope carries a typing signal
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.event == TYPING_EVENT
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Typing signal sent by one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    /// Who is (or stopped) typing
    pub sender_id: String,
    /// `true` while typing, `false` once stopped
    pub is_typing: bool,
}

impl TypingEvent {
    /// Create a new typing event
    #[must_use]
    pub fn new(sender: &ParticipantId, is_typing: bool) -> Self {
        Self {
            sender_id: sender.as_str().to_string(),
            is_typing,
        }
    }

    /// Check whether this event was sent by the given participant
    #[must_use]
    pub fn is_from(&self, participant: &ParticipantId) -> bool {
        participant == self.sender_id.as_str()
    }

    /// Wrap into a broadcast envelope
    pub fn to_envelope(&self) -> Result<BroadcastEnvelope, serde_json::Error> {
        Ok(BroadcastEnvelope::new(
            TYPING_EVENT,
            serde_json::to_value(self)?,
        ))
    }

    /// Extract a typing event from an envelope.
    ///
    /// Returns `Ok(None)` for envelopes carrying other events and an error
    /// when the payload lacks a sender id or typing flag.
    pub fn from_envelope(envelope: &BroadcastEnvelope) -> Result<Option<Self>, serde_json::Error> {
        if !envelope.is_typing() {
            return Ok(None);
        }
        Self::deserialize(&envelope.payload).map(Some)
    }
}

/// Typing event stamped with the time it reached this client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTypingEvent {
    pub event: TypingEvent,
    pub received_at: DateTime<Utc>,
}
