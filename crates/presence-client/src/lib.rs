//! # presence-client
//!
//! Real-time typing presence for one peer in one conversation.
//!
//! Outbound, `report_typing(true)` is throttled to one event per window
//! while `report_typing(false)` is always sent at once. Inbound, a peer's
//! `true` only stays valid for the decay window unless refreshed, so a lost
//! "stopped typing" event can never leave the indicator stuck.
//!
//! ## Example
//!
//! ```ignore
//! use presence_client::PresenceClient;
//! use presence_transport::InMemoryBus;
//! use std::sync::Arc;
//!
//! let bus = InMemoryBus::new();
//! let client = PresenceClient::new(Arc::new(bus.connect()));
//!
//! let channel = client.open("c1", "u1", "u2").await?;
//! channel.on_remote_typing_change(|typing| println!("u2 typing: {typing}"));
//!
//! channel.report_typing(true).await;
//! channel.stop_typing().await;
//! channel.close().await;
//! ```

pub mod channel;
pub mod client;
pub mod registry;
pub mod throttle;
pub mod tracker;

pub use channel::{SendOutcome, TypingChannel};
pub use client::{ChannelOptions, PresenceClient};
pub use registry::{ChannelRegistry, Registration};
pub use throttle::ThrottleGate;
pub use tracker::RemoteTypingTracker;
