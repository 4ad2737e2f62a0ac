//! Redis Pub/Sub transport.
//!
//! Publishes through a pooled connection and receives through a dedicated
//! subscriber connection that reconnects on failure.

mod pool;
mod publisher;
mod redis_transport;
mod subscriber;

pub use pool::RedisPool;
pub use publisher::Publisher;
pub use redis_transport::RedisTransport;
pub use subscriber::{Subscriber, SubscriberConfig};
