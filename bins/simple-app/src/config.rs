use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use edge_sdk::Options;

use crate::error::AppError;

pub const DEFAULT_APP_KEY: &str = "simple";

#[derive(Parser)]
#[command(name = "simple-app", about = "Example edge application built on edge-sdk")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to the node bus and run until SIGINT/SIGTERM
    Run(RunArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Path to a TOML config file (SDK options + app settings)
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Application key; overrides the config file
    #[arg(long, env = "APP_KEY")]
    pub app_key: Option<String>,

    /// NATS server URL; overrides the config file
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,

    /// Minimum level forwarded to the bus; overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Root directory for the persisted config; overrides the config file
    #[arg(long, env = "CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub sdk: Options,
    /// Period of the status/event/log report loop.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

fn default_report_interval_secs() -> u64 {
    10
}

impl AppConfig {
    pub fn new(app_key: &str) -> Self {
        Self {
            sdk: Options::new(app_key).with_version(env!("CARGO_PKG_VERSION")),
            report_interval_secs: default_report_interval_secs(),
        }
    }

    pub fn load(path: &std::path::Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError::Config {
            context: "read",
            detail: format!("'{}': {e}", path.display()),
        })?;
        toml::from_str(&content).map_err(|e| AppError::Config {
            context: "parse",
            detail: format!("'{}': {e}", path.display()),
        })
    }

    /// File (if given) first, then command-line overrides.
    pub fn resolve(args: &RunArgs) -> Result<Self, AppError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::new(DEFAULT_APP_KEY),
        };
        if let Some(key) = &args.app_key {
            config.sdk.app_key = key.clone();
        }
        if let Some(url) = &args.nats_url {
            config.sdk.nats_url = url.clone();
        }
        if let Some(level) = &args.log_level {
            config.sdk.log_level = level.clone();
        }
        if let Some(dir) = &args.config_dir {
            config.sdk.config_dir = dir.clone();
        }
        if config.sdk.app_version.is_empty() {
            config.sdk.app_version = env!("CARGO_PKG_VERSION").to_string();
        }
        Ok(config)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }
}
