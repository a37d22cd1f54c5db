use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::runtime::Runtime;

/// Send a heartbeat right away, then every `interval`, until `stop` fires.
///
/// A tick that comes due while the previous send is still running is
/// skipped, so a slow bus never causes a burst.
pub(crate) fn spawn_heartbeat(runtime: Arc<Runtime>, interval: Duration, stop: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(interval_secs = interval.as_secs_f64(), "heartbeat started");
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => runtime.send_heartbeat().await,
            }
        }
        tracing::debug!("heartbeat stopped");
    })
}
