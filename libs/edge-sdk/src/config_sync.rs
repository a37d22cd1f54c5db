//! Inbound config on `app.<key>.config.set`.
//!
//! Order per message: decode, persist, apply, log level, ack. A failure at
//! any step acks `success=false` and stops there; a decode failure is only
//! logged.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use edge_api::{BusMessage, ConfigAck, ConfigData, LogLevel, Payload, resolve_path};

use crate::handler::{HandlerError, panic_message};
use crate::runtime::Runtime;
use crate::transport::decode;

pub(crate) const ACK_OK: &str = "Config updated successfully";

#[derive(Clone)]
pub(crate) struct ConfigSync {
    runtime: Arc<Runtime>,
}

impl ConfigSync {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    pub async fn handle_message(&self, msg: BusMessage) {
        let data: ConfigData = match decode(&msg.payload) {
            Ok(d) => d,
            Err(e) => {
                self.runtime.log(LogLevel::Error, &format!("Failed to unmarshal config: {e}")).await;
                return;
            }
        };
        tracing::debug!(version = ?data.version, keys = data.config.len(), "config received");

        if let Err(e) = self.persist(&data.config).await {
            self.fail(format!("Failed to save config: {e}")).await;
            return;
        }

        if let Err(e) = self.apply(&data.config) {
            self.fail(format!("Failed to apply config: {e}")).await;
            return;
        }

        if let Some(level) = requested_log_level(&data.config) {
            self.runtime.apply_log_level(level);
            self.runtime.log(LogLevel::Info, &format!("Log level updated to: {level}")).await;
        }

        self.ack(true, ACK_OK).await;
        self.runtime.log(LogLevel::Info, ACK_OK).await;
    }

    /// File I/O and fsync run on the blocking pool, off the listener task.
    async fn persist(&self, config: &Payload) -> Result<(), String> {
        let store = self.runtime.store.clone();
        let config = config.clone();
        match tokio::task::spawn_blocking(move || store.save(&config)).await {
            Ok(saved) => saved.map_err(|e| e.to_string()),
            Err(e) => Err(format!("persist task failed: {e}")),
        }
    }

    fn apply(&self, config: &Payload) -> Result<(), HandlerError> {
        let Some(handler) = self.runtime.state.config_handler() else {
            return Ok(());
        };
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler(config))) {
            Ok(outcome) => outcome,
            Err(panic) => Err(format!("handler panicked: {}", panic_message(panic.as_ref())).into()),
        }
    }

    async fn fail(&self, message: String) {
        self.runtime.log(LogLevel::Error, &message).await;
        self.ack(false, message).await;
    }

    async fn ack(&self, success: bool, message: impl Into<String>) {
        // TODO: stamp acks with now_secs() once the edge agent accepts a
        // non-zero timestamp here.
        let ack = ConfigAck { success, message: message.into(), timestamp: 0 };
        if let Err(e) = self.runtime.transport.publish(self.runtime.topics.config_ack(), &ack).await {
            self.runtime.log(LogLevel::Error, &format!("Failed to send config ack: {e}")).await;
        }
    }
}

/// Log level carried by a config, if any.
///
/// When `sdk` is an object only `sdk.log_level` is consulted; otherwise the
/// top-level `log_level`. Non-string values are ignored.
pub(crate) fn requested_log_level(config: &Payload) -> Option<&str> {
    let path = if config.get("sdk").is_some_and(|v| v.is_object()) { "sdk.log_level" } else { "log_level" };
    resolve_path(config, path).and_then(|v| v.as_str())
}
