use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::SdkError;

pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_LEVEL: &str = "Info";
pub const DEFAULT_CONFIG_DIR: &str = "/usr/local/edge/apps";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client initialisation options.
///
/// Can be built in code ([`Options::new`] + `with_*`) or parsed from TOML.
/// Durations are written in seconds in TOML:
///
/// ```toml
/// app_key = "camera"
/// app_version = "1.4.0"
/// nats_url = "nats://10.0.0.2:4222"
/// heartbeat_interval_secs = 10
/// log_level = "Debug"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Options {
    /// Application key, e.g. "camera". Every subject is `app.<app_key>.*`.
    pub app_key: String,

    #[serde(default)]
    pub app_version: String,

    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(
        default = "default_heartbeat_interval",
        rename = "heartbeat_interval_secs",
        deserialize_with = "duration_secs"
    )]
    pub heartbeat_interval: Duration,

    /// Minimum level forwarded to the bus (Trace/Debug/Info/Warn/Error/Fatal/Panic).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Root of the persisted config files: `<config_dir>/<app_key>/config.yaml`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Close the client on SIGINT/SIGTERM.
    #[serde(default = "default_true")]
    pub handle_signals: bool,

    /// Install the process-wide `tracing` subscriber for local logs.
    #[serde(default = "default_true")]
    pub install_logger: bool,

    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_secs",
        deserialize_with = "duration_secs"
    )]
    pub request_timeout: Duration,
}

fn default_nats_url() -> String {
    DEFAULT_NATS_URL.to_string()
}
fn default_heartbeat_interval() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}
fn default_true() -> bool {
    true
}
fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn duration_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    Ok(Duration::from_secs(u64::deserialize(deserializer)?))
}

impl Options {
    pub fn new(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_version: String::new(),
            nats_url: default_nats_url(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            log_level: default_log_level(),
            config_dir: default_config_dir(),
            handle_signals: true,
            install_logger: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = url.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn with_logger(mut self, install: bool) -> Self {
        self.install_logger = install;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SdkError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Options(format!("{}: {e}", path.display())))?;
        Self::parse(&content)
    }

    /// Parse options from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, SdkError> {
        toml::from_str(toml_str).map_err(|e| SdkError::Options(e.to_string()))
    }

    /// Fill empty/zero fields with defaults and reject a missing app key.
    pub fn normalized(mut self) -> Result<Self, SdkError> {
        if self.app_key.trim().is_empty() {
            return Err(SdkError::Options("app_key is required".into()));
        }
        if self.nats_url.is_empty() {
            self.nats_url = default_nats_url();
        }
        if self.heartbeat_interval.is_zero() {
            self.heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL;
        }
        if self.log_level.is_empty() {
            self.log_level = default_log_level();
        }
        if self.request_timeout.is_zero() {
            self.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        }
        Ok(self)
    }
}
