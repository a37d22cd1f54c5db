/// Subjects an application uses, derived once from its key.
///
/// Every subject is `app.<app_key>.<suffix>`. The key is not checked for
/// subject-safe characters: a key containing spaces or wildcards yields
/// malformed subjects, which the bus rejects or misroutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    heartbeat: String,
    logs: String,
    events: String,
    status: String,
    command: String,
    command_result: String,
    config_set: String,
    config_ack: String,
}

impl TopicSet {
    pub const HEARTBEAT: &'static str = "heartbeat";
    pub const LOGS: &'static str = "logs";
    pub const EVENTS: &'static str = "events";
    pub const STATUS: &'static str = "status";
    pub const COMMAND: &'static str = "cmd";
    pub const COMMAND_RESULT: &'static str = "cmd.result";
    pub const CONFIG_SET: &'static str = "config.set";
    pub const CONFIG_ACK: &'static str = "config.ack";

    pub fn new(app_key: &str) -> Self {
        Self {
            heartbeat: subject(app_key, Self::HEARTBEAT),
            logs: subject(app_key, Self::LOGS),
            events: subject(app_key, Self::EVENTS),
            status: subject(app_key, Self::STATUS),
            command: subject(app_key, Self::COMMAND),
            command_result: subject(app_key, Self::COMMAND_RESULT),
            config_set: subject(app_key, Self::CONFIG_SET),
            config_ack: subject(app_key, Self::CONFIG_ACK),
        }
    }

    pub fn heartbeat(&self) -> &str {
        &self.heartbeat
    }

    pub fn logs(&self) -> &str {
        &self.logs
    }

    pub fn events(&self) -> &str {
        &self.events
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Inbound command subject.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Outbound command results when the command carried no reply subject.
    pub fn command_result(&self) -> &str {
        &self.command_result
    }

    /// Inbound config pushes.
    pub fn config_set(&self) -> &str {
        &self.config_set
    }

    pub fn config_ack(&self) -> &str {
        &self.config_ack
    }

    /// All eight subjects, in declaration order.
    pub fn all(&self) -> [&str; 8] {
        [
            &self.heartbeat,
            &self.logs,
            &self.events,
            &self.status,
            &self.command,
            &self.command_result,
            &self.config_set,
            &self.config_ack,
        ]
    }
}

/// `app.<app_key>.<suffix>`.
pub fn subject(app_key: &str, suffix: &str) -> String {
    format!("app.{app_key}.{suffix}")
}
