//! Client SDK for applications running on an edge node.
//!
//! A [`Client`] connects the application to the node's message bus under
//! `app.<app_key>.*` and takes care of:
//!
//! - periodic heartbeats with optional app metrics
//! - log forwarding (filtered by a runtime-adjustable minimum level),
//!   events and status reports
//! - remote commands, answered by the app's handler or by built-in defaults
//! - pushed configs: persisted atomically to
//!   `<config_dir>/<app_key>/config.yaml`, applied, then acknowledged
//!
//! ```no_run
//! use edge_sdk::{Client, CommandResult, Options};
//!
//! # async fn run() -> Result<(), edge_sdk::SdkError> {
//! let client = Client::connect(Options::new("camera").with_version("1.0.0")).await?;
//! client.on_command(|cmd| CommandResult::success(format!("did {}", cmd.action)));
//! client.log_info("ready").await;
//! client.wait_for_shutdown().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod commands;
mod config_sync;
pub mod error;
mod handler;
mod heartbeat;
pub mod logging;
pub mod options;
mod runtime;
mod state;
pub mod storage;
mod telemetry;
pub mod transport;

pub use client::Client;
pub use error::{LoggingError, PersistError, SdkError};
pub use handler::{CommandHandler, ConfigHandler, HandlerError, HeartbeatCallback};
pub use options::Options;
pub use storage::ConfigStore;
pub use transport::Transport;

pub use edge_api::{
    AppIdentity, Command, CommandResult, ConfigAck, ConfigData, EventData, HeartbeatData, LogData,
    LogLevel, Payload, StatusData, TopicSet, now_secs,
};
