//! Test fixtures and data generators
//!
//! Provides participant ids and hand-built envelopes for integration tests.

use presence_core::{BroadcastEnvelope, ParticipantId, TypingEvent};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Conversation used by the basic two-party scenario
pub const CONVERSATION: &str = "c1";
/// Local user in the two-party scenario
pub const ALICE: &str = "u1";
/// Peer in the two-party scenario
pub const BOB: &str = "u2";
/// A third participant who is not the watched peer
pub const CAROL: &str = "u3";

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Conversation id no other test uses
pub fn unique_conversation() -> String {
    format!("conv-{}", unique_suffix())
}

pub fn participant(id: &str) -> ParticipantId {
    ParticipantId::new(id).expect("valid participant id")
}

/// Well-formed typing envelope from `sender`
pub fn typing_envelope(sender: &str, is_typing: bool) -> BroadcastEnvelope {
    TypingEvent::new(&participant(sender), is_typing)
        .to_envelope()
        .expect("typing event serializes")
}

/// Typing envelope whose payload lacks `senderId`
pub fn anonymous_typing_envelope(is_typing: bool) -> BroadcastEnvelope {
    BroadcastEnvelope::new("typing", json!({ "isTyping": is_typing }))
}

/// Typing envelope whose `isTyping` is not a boolean
pub fn mistyped_typing_envelope(sender: &str) -> BroadcastEnvelope {
    BroadcastEnvelope::new("typing", json!({ "senderId": sender, "isTyping": "yes" }))
}

/// Envelope for some other event on the same channel
pub fn unrelated_envelope(sender: &str) -> BroadcastEnvelope {
    BroadcastEnvelope::new("read", json!({ "senderId": sender, "messageId": "m1" }))
}
