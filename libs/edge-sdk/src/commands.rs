//! Inbound commands on `app.<key>.cmd`.
//!
//! Every decoded command produces exactly one [`CommandResult`]. It goes to
//! the request's reply subject when there is one, otherwise to
//! `app.<key>.cmd.result`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde_json::json;

use edge_api::{BusMessage, Command, CommandResult, LogLevel, Payload, now_secs};

use crate::handler::panic_message;
use crate::runtime::Runtime;
use crate::telemetry::STATUS_RUNNING;
use crate::transport::decode;

#[derive(Clone)]
pub(crate) struct CommandRouter {
    runtime: Arc<Runtime>,
}

impl CommandRouter {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    pub async fn handle_message(&self, msg: BusMessage) {
        let command: Command = match decode(&msg.payload) {
            Ok(c) => c,
            Err(e) => {
                self.runtime.log(LogLevel::Error, &format!("Failed to unmarshal command: {e}")).await;
                return;
            }
        };
        tracing::debug!(action = %command.action, command_id = %command.command_id, "command received");

        let result = self.dispatch(&command);
        self.reply(msg.reply.as_deref(), &result).await;
    }

    /// Run the registered handler, or the built-in defaults when none is set.
    pub fn dispatch(&self, command: &Command) -> CommandResult {
        let result = match self.runtime.state.command_handler() {
            Some(handler) => match std::panic::catch_unwind(AssertUnwindSafe(|| handler(command))) {
                Ok(result) => result,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(action = %command.action, panic = %reason, "command handler panicked");
                    CommandResult::failure(format!("Command handler panicked: {reason}"))
                }
            },
            None => self.default_result(command),
        };
        finalize(result, command, now_secs())
    }

    fn default_result(&self, command: &Command) -> CommandResult {
        match command.action.as_str() {
            "start" => CommandResult::success("App is already running"),
            "stop" => CommandResult::success("Stop command received (managed by systemd)"),
            "restart" => CommandResult::success("Restart command received (managed by systemd)"),
            "snapshot" => {
                let mut data = Payload::new();
                data.insert("uptime".into(), json!(self.runtime.uptime()));
                data.insert("version".into(), json!(self.runtime.identity.version()));
                data.insert("status".into(), json!(STATUS_RUNNING));
                CommandResult::success("Snapshot command received").with_data(data)
            }
            other => CommandResult::failure(format!("Unknown command: {other}")),
        }
    }

    async fn reply(&self, reply: Option<&str>, result: &CommandResult) {
        match reply {
            Some(reply) if !reply.is_empty() => {
                if let Err(e) = self.runtime.transport.respond(reply, result).await {
                    self.runtime.log(LogLevel::Error, &format!("Failed to respond to command: {e}")).await;
                }
            }
            _ => {
                if let Err(e) = self.runtime.transport.publish(self.runtime.topics.command_result(), result).await {
                    self.runtime.log(LogLevel::Error, &format!("Failed to publish command result: {e}")).await;
                }
            }
        }
    }
}

/// Stamp the command id onto the result and fill a missing timestamp.
pub(crate) fn finalize(mut result: CommandResult, command: &Command, now: i64) -> CommandResult {
    result.command_id = command.command_id.clone();
    if result.timestamp == 0 {
        result.timestamp = now;
    }
    result
}
