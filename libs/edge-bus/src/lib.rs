//! [`edge_api::Bus`] implementations.
//!
//! - [`NatsBus`]: production transport over `async-nats`.
//! - [`MemoryBus`]: in-process bus for tests and broker-less runs.

mod memory;
mod nats;

pub use memory::{MemoryBus, MemorySubscription};
pub use nats::{NatsBus, NatsSubscription};
