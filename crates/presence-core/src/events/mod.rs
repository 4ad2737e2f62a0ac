//! Events carried over the presence broadcast channel
//!
//! These events are transient: they exist only in flight and in the
//! receiving client's decaying presence state. Nothing here is persisted.

mod typing_event;

pub use typing_event::{BroadcastEnvelope, InboundTypingEvent, TypingEvent, TYPING_EVENT};
