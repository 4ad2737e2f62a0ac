//! Error types shared by the presence crates

mod presence_error;

pub use presence_error::{PresenceError, PresenceResult};
