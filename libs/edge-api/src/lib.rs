//! Shared contracts for the edge app SDK: wire model, topic naming,
//! log levels and the [`Bus`] transport traits.
//!
//! This crate has no async runtime dependency. Transports live in
//! `edge-bus`, the client in `edge-sdk`.

pub mod bus;
pub mod error;
pub mod level;
pub mod model;
pub mod topic;
pub mod util;

pub use bus::{Bus, BusFuture, BusMessage, BusSubscription};
pub use error::BusError;
pub use level::{LogLevel, UnknownLogLevel, should_forward};
pub use model::{
    AppIdentity, Command, CommandResult, ConfigAck, ConfigData, EventData, HeartbeatData, LogData,
    Payload, StatusData,
};
pub use topic::TopicSet;
pub use util::{now_secs, resolve_path};
