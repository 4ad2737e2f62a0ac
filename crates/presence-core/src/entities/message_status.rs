//! Message delivery status.
//!
//! The three-state indicator rendered under an outgoing chat message. It is
//! driven by message persistence and read receipts, never by typing
//! presence, and only ever moves forward.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Delivery state of an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Not yet confirmed sent
    #[default]
    Sending,
    /// Sent, not yet read by the peer
    Delivered,
    /// The peer has viewed it
    Read,
}

impl MessageStatus {
    /// Get the string representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// Move to `next`, refusing to go backwards.
    ///
    /// Re-applying the current status is a no-op, since receipts may be
    /// delivered more than once.
    pub fn advance_to(self, next: Self) -> Result<Self, DomainError> {
        if next < self {
            return Err(DomainError::StatusRegression {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }

}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sending" => Ok(Self::Sending),
            "delivered" => Ok(Self::Delivered),
            "read" => Ok(Self::Read),
            _ => Err(format!("Invalid message status: {s}")),
        }
    }
}
