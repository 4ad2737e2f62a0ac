//! In-process broadcast bus.

mod bus;

pub use bus::{InMemoryBus, InMemoryTransport};
