//! Domain entities

mod message_status;

pub use message_status::MessageStatus;
