use std::path::PathBuf;

use edge_api::BusError;

/// Errors returned by the client.
///
/// Only construction can fail fatally (`Options`, `Bus` from connect or the
/// initial subscribes). Steady-state failures are logged inside the SDK and
/// never reach the application, except `request` results.
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("invalid options: {0}")]
    Options(String),

    #[error("bus: {0}")]
    Bus(#[from] BusError),

    #[error("encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("decode: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("{0}")]
    Persist(#[from] PersistError),
}

impl SdkError {
    /// True when a request ran past its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::Bus(e) if e.is_timeout())
    }
}

/// Failure to write or read the persisted config file.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to create config directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("failed to marshal config: {0}")]
    Encode(#[source] serde_yaml::Error),

    #[error("failed to write config file {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },

    #[error("failed to rename config file into {}: {source}", path.display())]
    Rename { path: PathBuf, source: std::io::Error },

    #[error("failed to read config file {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to unmarshal config {}: {source}", path.display())]
    Decode { path: PathBuf, source: serde_yaml::Error },
}

/// Failure to set up or adjust the local log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to install log subscriber: {0}")]
    Install(String),

    #[error("failed to reload log filter: {0}")]
    Reload(String),
}
