// # File Watcher
//
// Detects out-of-band edits to the configuration file and hands the reloaded
// interval to the scheduler.
//
// ## Protocol
//
// 1. Every poll interval (1 s), stat the file
// 2. If size or mtime differs from the recorded identity, `ConfigStore::reload`
// 3. If the store reports a change, send a `ReloadEvent` and wait for its
//    acknowledgement before polling again
//
// The acknowledgement makes delivery a rendezvous: the next change cannot be
// detected before the scheduler has observed the previous one.
//
// ## Errors
//
// A reload that fails (bad JSON, bad interval) is fatal: `run` returns the
// error and the previous configuration stays installed. A failed stat is
// logged and retried on the next poll, since editors briefly remove the file
// while saving.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::state::store::{ConfigStore, FileIdentity};

/// Default cadence at which the configuration file is stat'ed
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A verified configuration change, delivered to the scheduler
#[derive(Debug)]
pub struct ReloadEvent {
    /// Update interval of the newly installed configuration
    pub interval: Duration,
    ack: oneshot::Sender<()>,
}

impl ReloadEvent {
    /// Tell the watcher the event was observed
    pub fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// Create the single-slot reload channel
pub fn reload_channel() -> (mpsc::Sender<ReloadEvent>, mpsc::Receiver<ReloadEvent>) {
    mpsc::channel(1)
}

/// Polls the configuration file and drives live reloads
pub struct FileWatcher {
    store: Arc<ConfigStore>,
    events: mpsc::Sender<ReloadEvent>,
    poll_interval: Duration,
}

impl FileWatcher {
    /// Create a watcher for `store`
    ///
    /// # Parameters
    ///
    /// - `store`: Shared configuration store
    /// - `events`: Sending half of [`reload_channel`]
    pub fn new(store: Arc<ConfigStore>, events: mpsc::Sender<ReloadEvent>) -> Self {
        Self {
            store,
            events,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll cadence
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Run until shutdown, the scheduler goes away, or a reload fails
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown requested or the scheduler stopped listening
    /// - `Err(Error)`: A live reload failed (fatal)
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        let path = self.store.path().to_path_buf();
        let mut recorded = self.store.identity().await;
        debug!(path = %path.display(), poll = ?self.poll_interval, "File watcher started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => {
                    debug!("File watcher stopping");
                    return Ok(());
                }
            }

            let current = match FileIdentity::of(&path).await {
                Ok(identity) => identity,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to stat configuration file");
                    continue;
                }
            };
            if current == recorded {
                continue;
            }

            let (config, changed) = match self.store.reload().await {
                Ok(result) => result,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Configuration reload failed");
                    return Err(e);
                }
            };
            recorded = self.store.identity().await;

            if !changed {
                continue;
            }

            let interval = config.interval()?;
            let (ack_tx, ack_rx) = oneshot::channel();
            let event = ReloadEvent {
                interval,
                ack: ack_tx,
            };

            let delivered = async {
                self.events.send(event).await.is_ok() && ack_rx.await.is_ok()
            };

            tokio::select! {
                delivered = delivered => {
                    if !delivered {
                        info!("Scheduler stopped listening, file watcher exiting");
                        return Ok(());
                    }
                    debug!(interval = ?interval, "Reload event delivered");
                }
                _ = &mut shutdown => {
                    debug!("File watcher stopping");
                    return Ok(());
                }
            }
        }
    }
}
