// Session reclamation task.
//
// Periodically evicts sessions that have gone idle or outlived the
// absolute age cap. The absolute cap bounds session lifetime even under
// continuous activity. Evicted sessions' participants are not notified;
// their next event comes back as SESSION_NOT_FOUND.

use crate::store::SessionStore;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Timing knobs for the reclamation loop.
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// How often the store is scanned.
    pub tick_interval: Duration,
    /// Sessions idle longer than this are evicted.
    pub idle_timeout: Duration,
    /// Sessions older than this are evicted regardless of activity.
    pub max_age: Duration,
}

/// Handle for the reclamation background task.
/// Dropping the handle cancels the task.
pub struct ReaperHandle {
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ReaperHandle {
    /// Signal the loop to stop and wait until it has exited, so no timer
    /// outlives the process's lifecycle owner.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

/// Spawn the reclamation loop over `store`.
pub fn start_reaper(store: SessionStore, config: ReaperConfig) -> ReaperHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        reaper_loop(store, config, shutdown_rx).await;
    });
    ReaperHandle { task: Some(task), shutdown_tx }
}

async fn reaper_loop(
    store: SessionStore,
    config: ReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = shutdown_rx.changed() => {
                debug!("reaper shutting down");
                break;
            }
        }

        let evicted = store.evict_expired(config.idle_timeout, config.max_age).await;
        if !evicted.is_empty() {
            info!(count = evicted.len(), "reclaimed expired sessions");
        }
    }
}
