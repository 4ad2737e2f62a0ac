//! # presence-transport
//!
//! Named broadcast channels for presence signaling.
//!
//! ## Features
//!
//! - **Transport trait**: `subscribe` / `send` / `unsubscribe` over named channels
//!   with best-effort, at-most-once delivery
//! - **In-process bus**: shared in-memory broadcast for tests and single-process use
//! - **Redis**: `PUBLISH` through a deadpool pool and a background `SUBSCRIBE` listener
//!
//! ## Example
//!
//! ```ignore
//! use presence_transport::{BroadcastTransport, ChannelName, InMemoryBus};
//!
//! let bus = InMemoryBus::new();
//! let alice = bus.connect();
//! let bob = bus.connect();
//!
//! let channel = ChannelName::conversation("typing:", &conversation_id);
//! let mut subscription = bob.subscribe(&channel).await?;
//! alice.send(&channel, &envelope).await?;
//! let message = subscription.recv().await;
//! ```

pub mod channels;
pub mod memory;
pub mod pubsub;
pub mod transport;

pub use channels::{ChannelName, DEFAULT_CHANNEL_PREFIX};
pub use memory::{InMemoryBus, InMemoryTransport};
pub use pubsub::{Publisher, RedisPool, RedisTransport, Subscriber, SubscriberConfig};
pub use transport::{
    BroadcastTransport, ReceivedMessage, SharedTransport, Subscription, SubscriptionId,
    TransportError, TransportResult,
};
