use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use edge_api::{AppIdentity, Bus, Command, CommandResult, LogLevel, Payload, TopicSet};
use edge_bus::NatsBus;

use crate::commands::CommandRouter;
use crate::config_sync::ConfigSync;
use crate::error::SdkError;
use crate::handler::HandlerError;
use crate::heartbeat::spawn_heartbeat;
use crate::logging;
use crate::options::Options;
use crate::runtime::Runtime;
use crate::storage::ConfigStore;
use crate::transport::{Transport, spawn_listener};

/// Connection of one edge application to the bus.
///
/// Cheap to clone; clones share the same connection and state. Call
/// [`close`](Self::close) (or let a signal do it) to stop the heartbeat
/// and the listeners; dropping the last clone does not.
#[derive(Clone)]
pub struct Client {
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("app_key", &self.runtime.identity.key())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Client {
    /// Connect to NATS at `options.nats_url` and start the client.
    pub async fn connect(options: Options) -> Result<Self, SdkError> {
        let options = options.normalized()?;
        let bus = NatsBus::connect(&options.nats_url).await?;
        Self::start(options, Arc::new(bus)).await
    }

    /// Start the client over an already connected bus.
    pub async fn with_bus(options: Options, bus: Arc<dyn Bus>) -> Result<Self, SdkError> {
        let options = options.normalized()?;
        Self::start(options, bus).await
    }

    async fn start(options: Options, bus: Arc<dyn Bus>) -> Result<Self, SdkError> {
        let identity = AppIdentity::new(options.app_key.clone(), options.app_version.clone());

        // --- Local logger ---
        let local_log = if options.install_logger {
            let level = options.log_level.parse().unwrap_or(LogLevel::Info);
            match logging::install(level) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::debug!(error = %e, "using the existing log subscriber");
                    None
                }
            }
        } else {
            None
        };

        let runtime = Arc::new(Runtime::new(
            identity,
            Transport::new(bus),
            ConfigStore::new(&options.config_dir, &options.app_key),
            options.log_level.clone(),
            local_log,
            options.request_timeout,
        ));

        // --- Subscriptions ---
        let command_sub = match runtime.transport.subscribe(runtime.topics.command()).await {
            Ok(sub) => sub,
            Err(e) => {
                runtime.transport.close().await;
                return Err(e);
            }
        };
        let config_sub = match runtime.transport.subscribe(runtime.topics.config_set()).await {
            Ok(sub) => sub,
            Err(e) => {
                runtime.transport.close().await;
                return Err(e);
            }
        };

        let router = CommandRouter::new(runtime.clone());
        runtime.track(spawn_listener("commands", command_sub, runtime.listeners.clone(), move |msg| {
            let router = router.clone();
            async move { router.handle_message(msg).await }
        }));

        let sync = ConfigSync::new(runtime.clone());
        runtime.track(spawn_listener("config", config_sub, runtime.listeners.clone(), move |msg| {
            let sync = sync.clone();
            async move { sync.handle_message(msg).await }
        }));

        // --- Heartbeat ---
        let stop = runtime.state.heartbeat_stop();
        runtime.track(spawn_heartbeat(runtime.clone(), options.heartbeat_interval, stop));

        let client = Self { runtime };

        // --- Signals ---
        if options.handle_signals {
            spawn_signal_listener(client.clone());
        }

        tracing::info!(
            app_key = %client.runtime.identity.key(),
            version = %client.runtime.identity.version(),
            heartbeat_secs = options.heartbeat_interval.as_secs(),
            "edge client started"
        );
        Ok(client)
    }

    // ═══════════════════════════════════════════════════════════════
    //  Identity / state
    // ═══════════════════════════════════════════════════════════════

    pub fn identity(&self) -> &AppIdentity {
        &self.runtime.identity
    }

    pub fn topics(&self) -> &TopicSet {
        &self.runtime.topics
    }

    pub fn is_running(&self) -> bool {
        self.runtime.state.is_running()
    }

    /// Whole seconds since the client started.
    pub fn uptime(&self) -> u64 {
        self.runtime.uptime()
    }

    pub fn min_log_level(&self) -> String {
        self.runtime.state.min_log_level()
    }

    /// Change the minimum level forwarded to the bus. The local log
    /// subscriber keeps its level; a pushed config `log_level` changes both.
    pub fn set_min_log_level(&self, level: impl Into<String>) {
        self.runtime.state.set_min_log_level(level.into());
    }

    // ═══════════════════════════════════════════════════════════════
    //  Callbacks
    // ═══════════════════════════════════════════════════════════════

    /// Extra metrics merged into every heartbeat. Replaces any previous one.
    pub fn set_heartbeat_callback<F>(&self, callback: F)
    where
        F: Fn() -> Payload + Send + Sync + 'static,
    {
        self.runtime.state.write().heartbeat_callback = Some(Arc::new(callback));
    }

    /// Handle commands instead of the built-in defaults.
    pub fn on_command<F>(&self, handler: F)
    where
        F: Fn(&Command) -> CommandResult + Send + Sync + 'static,
    {
        self.runtime.state.write().command_handler = Some(Arc::new(handler));
    }

    /// Apply pushed configs. An `Err` acks the push as failed.
    pub fn on_config<F>(&self, handler: F)
    where
        F: Fn(&Payload) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.runtime.state.write().config_handler = Some(Arc::new(handler));
    }

    // ═══════════════════════════════════════════════════════════════
    //  Logs
    // ═══════════════════════════════════════════════════════════════

    pub async fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.runtime.log(level, message.as_ref()).await;
    }

    pub async fn log_trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message).await;
    }

    pub async fn log_debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message).await;
    }

    pub async fn log_info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn log_warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message).await;
    }

    pub async fn log_error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message).await;
    }

    /// Logged and forwarded as Fatal. Does not exit the process.
    pub async fn log_fatal(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Fatal, message).await;
    }

    /// Logged and forwarded as Panic. Does not panic.
    pub async fn log_panic(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Panic, message).await;
    }

    // ═══════════════════════════════════════════════════════════════
    //  Events / status / config
    // ═══════════════════════════════════════════════════════════════

    pub async fn emit_event(&self, event: impl AsRef<str>, data: Payload) {
        self.runtime.emit_event(event.as_ref(), data).await;
    }

    pub async fn report_status(&self, data: Payload) {
        self.runtime.report_status(data).await;
    }

    /// Path of the persisted config file.
    pub fn config_path(&self) -> &Path {
        self.runtime.store.path()
    }

    /// Last persisted config; empty if none was ever pushed.
    pub fn load_config(&self) -> Result<Payload, SdkError> {
        Ok(self.runtime.store.load()?)
    }

    // ═══════════════════════════════════════════════════════════════
    //  Requests / heartbeat
    // ═══════════════════════════════════════════════════════════════

    /// JSON request/reply with the configured default timeout.
    pub async fn request<T, R>(&self, subject: &str, value: &T) -> Result<R, SdkError>
    where
        T: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.request_with_timeout(subject, value, self.runtime.request_timeout).await
    }

    pub async fn request_with_timeout<T, R>(&self, subject: &str, value: &T, timeout: Duration) -> Result<R, SdkError>
    where
        T: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        self.runtime.transport.request(subject, value, timeout).await
    }

    /// Restart the heartbeat loop with a new interval. The first beat of the
    /// new loop goes out immediately. No-op once closed.
    pub fn set_heartbeat_interval(&self, interval: Duration) {
        let interval = if interval.is_zero() { crate::options::DEFAULT_HEARTBEAT_INTERVAL } else { interval };
        let stop = CancellationToken::new();
        if !self.runtime.state.replace_heartbeat_stop(stop.clone()) {
            return;
        }
        self.runtime.track(spawn_heartbeat(self.runtime.clone(), interval, stop));
        tracing::debug!(interval_secs = interval.as_secs_f64(), "heartbeat interval changed");
    }

    // ═══════════════════════════════════════════════════════════════
    //  Shutdown
    // ═══════════════════════════════════════════════════════════════

    /// Stop the heartbeat and the listeners, then close the bus.
    ///
    /// Safe to call any number of times from any task; only the first call
    /// does anything.
    pub async fn close(&self) {
        if !self.runtime.state.shutdown() {
            return;
        }
        self.runtime.listeners.cancel();
        self.runtime.join_tasks().await;
        self.runtime.transport.close().await;
        self.runtime.closed.cancel();
        tracing::info!(app_key = %self.runtime.identity.key(), "edge client closed");
    }

    /// Resolve once the client has been closed, by [`close`](Self::close)
    /// or by a shutdown signal.
    pub async fn wait_for_shutdown(&self) {
        self.runtime.closed.cancelled().await;
    }
}

/// Close the client on SIGINT or SIGTERM. The process is left running so
/// the application decides how to exit.
fn spawn_signal_listener(client: Client) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = wait_for_signal() => match received {
                Ok(()) => {
                    tracing::info!("received shutdown signal, closing client");
                    client.close().await;
                }
                Err(e) => tracing::warn!(error = %e, "failed to listen for shutdown signals"),
            },
            _ = client.runtime.closed.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
