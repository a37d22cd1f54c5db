use serde::{Deserialize, Deserializer, Serialize};

/// Schema-less JSON object carried by commands, events, status and config.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// `null` decodes as an empty map, the same as a missing field.
fn nullable_payload<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Payload, D::Error> {
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

// ════════════════════════════════════════════════════════════════
//  Identity
// ════════════════════════════════════════════════════════════════

/// Who the application is. Fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    key: String,
    version: String,
}

impl AppIdentity {
    pub fn new(key: impl Into<String>, version: impl Into<String>) -> Self {
        Self { key: key.into(), version: version.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

// ════════════════════════════════════════════════════════════════
//  Commands
// ════════════════════════════════════════════════════════════════

/// Remote command received on `app.<key>.cmd`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// start, stop, restart, snapshot, or an application-defined action.
    #[serde(default)]
    pub action: String,
    #[serde(default, deserialize_with = "nullable_payload")]
    pub payload: Payload,
    #[serde(default)]
    pub command_id: String,
}

impl Command {
    pub fn new(action: impl Into<String>, command_id: impl Into<String>) -> Self {
        Self { action: action.into(), payload: Payload::new(), command_id: command_id.into() }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// Outcome of a command.
///
/// Handlers may leave `command_id` empty and `timestamp` at zero; the router
/// fills both in before replying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub command_id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
    #[serde(default)]
    pub timestamp: i64,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), ..Default::default() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), ..Default::default() }
    }

    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// ════════════════════════════════════════════════════════════════
//  Telemetry
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub app_key: String,
    pub version: String,
    /// running, stopped, error
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Payload>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    /// Level name as sent by the app: "Info", "Warn", ...
    pub level: String,
    #[serde(rename = "msg")]
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub event: String,
    #[serde(default, deserialize_with = "nullable_payload")]
    pub data: Payload,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub app_key: String,
    pub status: String,
    #[serde(default, deserialize_with = "nullable_payload")]
    pub data: Payload,
    pub timestamp: i64,
}

// ════════════════════════════════════════════════════════════════
//  Config push
// ════════════════════════════════════════════════════════════════

/// Config push received on `app.<key>.config.set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default, deserialize_with = "nullable_payload")]
    pub config: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

/// Acknowledgment published on `app.<key>.config.ack`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigAck {
    pub success: bool,
    pub message: String,
    pub timestamp: i64,
}
