//! Decaying view of whether the peer is typing.
//!
//! State changes only through an inbound event from the peer, the decay
//! deadline passing, or the tracker being retargeted. Every method returns
//! `Some(new_state)` when the observed state flipped and `None` otherwise,
//! so callers notify exactly once per transition.

use presence_core::{ParticipantId, TypingEvent};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RemoteTypingTracker {
    peer: ParticipantId,
    decay: Duration,
    is_typing: bool,
    deadline: Option<Instant>,
}

impl RemoteTypingTracker {
    #[must_use]
    pub fn new(peer: ParticipantId, decay: Duration) -> Self {
        Self {
            peer,
            decay,
            is_typing: false,
            deadline: None,
        }
    }

    #[must_use]
    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    /// When the current `true` expires, if any
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Apply an inbound event received at `now`.
    ///
    /// Events from anyone but the peer (including our own echoes) are ignored.
    pub fn apply(&mut self, event: &TypingEvent, now: Instant) -> Option<bool> {
        if !event.is_from(&self.peer) {
            return None;
        }

        if event.is_typing {
            self.deadline = Some(now + self.decay);
            self.set(true)
        } else {
            self.deadline = None;
            self.set(false)
        }
    }

    /// Decay the state if its deadline has passed at `now`
    pub fn expire(&mut self, now: Instant) -> Option<bool> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.set(false)
            }
            _ => None,
        }
    }

    /// Watch a different peer; the state starts over as not typing
    pub fn switch_peer(&mut self, peer: ParticipantId) -> Option<bool> {
        self.peer = peer;
        self.reset()
    }

    /// Drop back to not typing and cancel any pending decay
    pub fn reset(&mut self) -> Option<bool> {
        self.deadline = None;
        self.set(false)
    }

    fn set(&mut self, is_typing: bool) -> Option<bool> {
        if self.is_typing == is_typing {
            return None;
        }
        self.is_typing = is_typing;
        Some(is_typing)
    }
}
