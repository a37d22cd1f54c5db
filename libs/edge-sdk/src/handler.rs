use std::sync::Arc;

use edge_api::{Command, CommandResult, Payload};

/// Error a config handler returns to reject a pushed config.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Extra heartbeat metrics. Keys override the SDK's own (`uptime`).
pub type HeartbeatCallback = Arc<dyn Fn() -> Payload + Send + Sync>;

/// Handles a remote command. `command_id` and `timestamp` of the returned
/// result may be left unset.
pub type CommandHandler = Arc<dyn Fn(&Command) -> CommandResult + Send + Sync>;

/// Applies a pushed config. Called after the config has been persisted.
pub type ConfigHandler = Arc<dyn Fn(&Payload) -> Result<(), HandlerError> + Send + Sync>;

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
