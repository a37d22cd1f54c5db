//! Local log output.
//!
//! The SDK writes every app log line to a process-wide `tracing` subscriber
//! (stderr) in addition to forwarding it to the bus. The filter sits in a
//! reload layer so a pushed `log_level` takes effect without a restart.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use edge_api::LogLevel;

use crate::error::LoggingError;

/// Target of app log lines written through the client.
pub const APP_LOG_TARGET: &str = "edge_app";

static LOCAL_LOG: OnceCell<LocalLogHandle> = OnceCell::new();

/// Changes the local log level at runtime.
#[derive(Clone)]
pub struct LocalLogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl std::fmt::Debug for LocalLogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLogHandle").finish_non_exhaustive()
    }
}

impl LocalLogHandle {
    pub fn set_level(&self, level: LogLevel) -> Result<(), LoggingError> {
        self.filter
            .reload(EnvFilter::new(directive(level)))
            .map_err(|e| LoggingError::Reload(e.to_string()))
    }
}

/// Install the global subscriber on first call; later calls return the same
/// handle. `RUST_LOG`, when set, wins over `level` for the initial filter.
pub fn install(level: LogLevel) -> Result<LocalLogHandle, LoggingError> {
    LOCAL_LOG.get_or_try_init(|| install_subscriber(level)).cloned()
}

fn install_subscriber(level: LogLevel) -> Result<LocalLogHandle, LoggingError> {
    let initial = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)));
    let (filter, handle) = reload::Layer::new(initial);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(LocalLogHandle { filter: handle })
}

/// Filter directive for a level. Fatal and Panic have no `tracing`
/// counterpart and map to `error`.
pub(crate) fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error | LogLevel::Fatal | LogLevel::Panic => "error",
    }
}

/// Write an app log line to the local subscriber.
pub(crate) fn record(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(target: APP_LOG_TARGET, "{message}"),
        LogLevel::Debug => tracing::debug!(target: APP_LOG_TARGET, "{message}"),
        LogLevel::Info => tracing::info!(target: APP_LOG_TARGET, "{message}"),
        LogLevel::Warn => tracing::warn!(target: APP_LOG_TARGET, "{message}"),
        LogLevel::Error => tracing::error!(target: APP_LOG_TARGET, "{message}"),
        LogLevel::Fatal | LogLevel::Panic => {
            tracing::error!(target: APP_LOG_TARGET, severity = level.as_str(), "{message}")
        }
    }
}
