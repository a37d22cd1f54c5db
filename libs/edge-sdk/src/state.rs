use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio_util::sync::CancellationToken;

use crate::handler::{CommandHandler, ConfigHandler, HeartbeatCallback};

/// Mutable client state behind one reader/writer lock.
pub(crate) struct RuntimeState {
    pub running: bool,
    /// Raw level name; an unknown name forwards every line.
    pub min_log_level: String,
    pub heartbeat_callback: Option<HeartbeatCallback>,
    pub command_handler: Option<CommandHandler>,
    pub config_handler: Option<ConfigHandler>,
    /// Stop signal of the heartbeat loop currently running.
    pub heartbeat_stop: CancellationToken,
}

pub(crate) struct SharedState {
    inner: RwLock<RuntimeState>,
}

impl SharedState {
    pub fn new(min_log_level: String) -> Self {
        Self {
            inner: RwLock::new(RuntimeState {
                running: true,
                min_log_level,
                heartbeat_callback: None,
                command_handler: None,
                config_handler: None,
                heartbeat_stop: CancellationToken::new(),
            }),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RuntimeState> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("runtime state read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RuntimeState> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("runtime state write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.read().running
    }

    pub fn min_log_level(&self) -> String {
        self.read().min_log_level.clone()
    }

    pub fn set_min_log_level(&self, level: String) {
        self.write().min_log_level = level;
    }

    // Snapshots: the Arc is cloned under the read lock and called after
    // the guard is gone, so a slow callback never blocks registration.

    pub fn heartbeat_callback(&self) -> Option<HeartbeatCallback> {
        self.read().heartbeat_callback.clone()
    }

    pub fn command_handler(&self) -> Option<CommandHandler> {
        self.read().command_handler.clone()
    }

    pub fn config_handler(&self) -> Option<ConfigHandler> {
        self.read().config_handler.clone()
    }

    pub fn heartbeat_stop(&self) -> CancellationToken {
        self.read().heartbeat_stop.clone()
    }

    /// Swap in a new heartbeat stop token and cancel the old one.
    /// Returns `false` (and changes nothing) once the client is closed.
    pub fn replace_heartbeat_stop(&self, next: CancellationToken) -> bool {
        let mut state = self.write();
        if !state.running {
            return false;
        }
        let previous = std::mem::replace(&mut state.heartbeat_stop, next);
        previous.cancel();
        true
    }

    /// Flip `running` off and stop the heartbeat, once.
    ///
    /// The check and the flip happen under the write lock, so of several
    /// concurrent callers exactly one gets `true`.
    pub fn shutdown(&self) -> bool {
        let mut state = self.write();
        if !state.running {
            return false;
        }
        state.running = false;
        state.heartbeat_stop.cancel();
        true
    }
}
