use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use edge_api::{AppIdentity, LogLevel, TopicSet};

use crate::logging::LocalLogHandle;
use crate::state::SharedState;
use crate::storage::ConfigStore;
use crate::transport::Transport;

/// How long `close` waits for background tasks before aborting them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything the background tasks share with the client.
pub(crate) struct Runtime {
    pub identity: AppIdentity,
    pub topics: TopicSet,
    pub transport: Transport,
    pub state: SharedState,
    pub store: ConfigStore,
    pub local_log: Option<LocalLogHandle>,
    pub request_timeout: Duration,
    started_at: Instant,
    /// Stops the subscription listeners.
    pub listeners: CancellationToken,
    /// Fired once `close` has finished.
    pub closed: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    pub fn new(
        identity: AppIdentity,
        transport: Transport,
        store: ConfigStore,
        min_log_level: String,
        local_log: Option<LocalLogHandle>,
        request_timeout: Duration,
    ) -> Self {
        let topics = TopicSet::new(identity.key());
        Self {
            identity,
            topics,
            transport,
            state: SharedState::new(min_log_level),
            store,
            local_log,
            request_timeout,
            started_at: Instant::now(),
            listeners: CancellationToken::new(),
            closed: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Whole seconds since the client was created.
    pub fn uptime(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Keep a task handle so `close` can wait for it.
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = match self.tasks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Wait for tracked tasks, aborting whatever is still running after the
    /// grace period.
    pub async fn join_tasks(&self) {
        let handles = {
            let mut tasks = match self.tasks.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *tasks)
        };

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
            for h in handles {
                let _ = h.await;
            }
        })
        .await;
        if joined.is_err() {
            tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "background tasks did not stop in time, aborting");
            for a in aborts {
                a.abort();
            }
        }
    }

    /// Store the new minimum bus level and, if the name is known, apply it
    /// to the local subscriber. Unknown names set the local level to Info.
    pub fn apply_log_level(&self, level: &str) {
        self.state.set_min_log_level(level.to_string());

        let Some(local) = &self.local_log else { return };
        let parsed = level.parse().unwrap_or(LogLevel::Info);
        if let Err(e) = local.set_level(parsed) {
            tracing::warn!(error = %e, level, "failed to update local log level");
        }
    }
}
