//! Outbound throttle for typing signals.

use std::time::Duration;
use tokio::time::Instant;

/// Admits at most one `typing: true` per window; `typing: false` always passes
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    window: Duration,
    last_sent: Option<Instant>,
}

impl ThrottleGate {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_sent: None,
        }
    }

    /// Decide whether a signal may go out at `now`.
    ///
    /// A coalesced `true` is dropped, not queued. `false` leaves the window
    /// as it is, so a stop never lets a second `true` out early.
    pub fn admit(&mut self, is_typing: bool, now: Instant) -> bool {
        if !is_typing {
            return true;
        }

        match self.last_sent {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }

    /// Forget the current window
    pub fn reset(&mut self) {
        self.last_sent = None;
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}
