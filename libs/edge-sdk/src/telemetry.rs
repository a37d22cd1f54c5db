//! Outbound telemetry: logs, events, status and heartbeats.
//!
//! All of it is fire-and-forget. Nothing is sent once the client is
//! closed, and a failed publish becomes a local error line.

use std::panic::AssertUnwindSafe;

use serde_json::json;

use edge_api::{EventData, HeartbeatData, LogData, LogLevel, Payload, StatusData, now_secs, should_forward};

use crate::handler::panic_message;
use crate::logging;
use crate::runtime::Runtime;

pub(crate) const STATUS_RUNNING: &str = "running";

impl Runtime {
    /// Write a line locally and forward it to `app.<key>.logs` if it meets
    /// the minimum level.
    pub(crate) async fn log(&self, level: LogLevel, message: &str) {
        logging::record(level, message);

        let (running, minimum) = {
            let state = self.state.read();
            (state.running, state.min_log_level.clone())
        };
        if !running || !should_forward(level, &minimum) {
            return;
        }

        let data = LogData { level: level.to_string(), message: message.to_string(), timestamp: now_secs() };
        if let Err(e) = self.transport.publish(self.topics.logs(), &data).await {
            // Local only: forwarding this would recurse.
            tracing::error!(error = %e, "failed to publish log");
        }
    }

    pub(crate) async fn emit_event(&self, event: &str, data: Payload) {
        if !self.state.is_running() {
            return;
        }
        let data = EventData { event: event.to_string(), data, timestamp: now_secs() };
        if let Err(e) = self.transport.publish(self.topics.events(), &data).await {
            tracing::error!(event, error = %e, "failed to publish event");
        }
    }

    pub(crate) async fn report_status(&self, data: Payload) {
        if !self.state.is_running() {
            return;
        }
        let data = StatusData {
            app_key: self.identity.key().to_string(),
            status: STATUS_RUNNING.to_string(),
            data,
            timestamp: now_secs(),
        };
        if let Err(e) = self.transport.publish(self.topics.status(), &data).await {
            tracing::error!(error = %e, "failed to publish status");
        }
    }

    /// Publish one heartbeat. Skipped while closed or disconnected.
    pub(crate) async fn send_heartbeat(&self) {
        if !self.state.is_running() || !self.transport.is_connected() {
            return;
        }

        let mut metrics = Payload::new();
        metrics.insert("uptime".into(), json!(self.uptime()));
        if let Some(callback) = self.state.heartbeat_callback() {
            match std::panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                Ok(extra) => metrics.extend(extra),
                Err(panic) => {
                    tracing::error!(panic = %panic_message(panic.as_ref()), "heartbeat callback panicked");
                }
            }
        }

        let data = HeartbeatData {
            app_key: self.identity.key().to_string(),
            version: self.identity.version().to_string(),
            status: STATUS_RUNNING.to_string(),
            metrics: Some(metrics),
            timestamp: now_secs(),
        };
        if let Err(e) = self.transport.publish(self.topics.heartbeat(), &data).await {
            tracing::error!(error = %e, "failed to send heartbeat");
        }
    }
}
