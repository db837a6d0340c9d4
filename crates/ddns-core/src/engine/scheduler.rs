//! Interval-driven scheduler
//!
//! ## State Machine
//!
//! ```text
//!            Tick: run one cycle inline
//!               ┌──────────┐
//!               ▼          │
//!        ┌────────────────────┐   ReloadObserved(new != armed)
//!  ─────►│  Armed(interval)   │──────────────────────────────► Armed(new)
//!        └────────────────────┘
//!               │ shutdown
//!               ▼
//!            Stopped
//! ```
//!
//! Cycles run inside the `select!` arm that handled the tick, so a reload
//! event that arrives mid-cycle is received only after the cycle completes,
//! and two cycles never overlap. The `select!` is biased towards reloads, so
//! a reload delivered during a cycle is observed before a tick that came due
//! meanwhile. Re-arming discards the time elapsed since the last tick: the
//! new interval counts from the moment the reload was observed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::engine::orchestrator::{CycleOutcome, Orchestrator};
use crate::error::{ErrorKind, Result};
use crate::state::ReloadEvent;

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Timer armed at start-up
    Armed { interval: Duration },

    /// A tick fired and a cycle began
    CycleStarted,

    /// The cycle finished without error
    CycleCompleted { outcome: CycleOutcome },

    /// The cycle returned an error; the loop continues
    CycleFailed { kind: ErrorKind, error: String },

    /// A reload event was received
    ReloadObserved { interval: Duration },

    /// The timer was re-armed with a new interval
    Rearmed { from: Duration, to: Duration },

    /// The loop exited
    Stopped,
}

/// Drives update cycles on the configured interval
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    reloads: mpsc::Receiver<ReloadEvent>,
    update_on_start: bool,
    event_tx: Option<mpsc::Sender<SchedulerEvent>>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `orchestrator`: Runs one cycle per tick
    /// - `reloads`: Receiving half of [`reload_channel`](crate::state::reload_channel)
    pub fn new(orchestrator: Arc<Orchestrator>, reloads: mpsc::Receiver<ReloadEvent>) -> Self {
        Self {
            orchestrator,
            reloads,
            update_on_start: false,
            event_tx: None,
        }
    }

    /// Run one cycle immediately instead of waiting one full interval
    pub fn update_on_start(mut self, enabled: bool) -> Self {
        self.update_on_start = enabled;
        self
    }

    /// Create a bounded channel of scheduler events
    ///
    /// Events are dropped with a warning when the receiver falls behind.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// Run until `shutdown` fires
    ///
    /// Cycle errors are logged and never stop the loop.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: The installed configuration has no valid interval
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<()> {
        let mut armed = self.orchestrator.store().snapshot().await.interval()?;
        let mut ticker = arm(armed);
        let mut reloads_open = true;

        info!(interval = ?armed, "Scheduler armed");
        self.emit_event(SchedulerEvent::Armed { interval: armed });

        if self.update_on_start {
            self.run_cycle().await;
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                event = self.reloads.recv(), if reloads_open => {
                    let Some(event) = event else {
                        debug!("Reload channel closed");
                        reloads_open = false;
                        continue;
                    };

                    self.emit_event(SchedulerEvent::ReloadObserved { interval: event.interval });
                    if event.interval != armed {
                        info!(from = ?armed, to = ?event.interval, "Update interval changed, re-arming");
                        self.emit_event(SchedulerEvent::Rearmed { from: armed, to: event.interval });
                        armed = event.interval;
                        ticker = arm(armed);
                    } else {
                        debug!(interval = ?armed, "Configuration reloaded, interval unchanged");
                    }
                    event.acknowledge();
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        drop(ticker);
        self.emit_event(SchedulerEvent::Stopped);
        info!("Scheduler stopped");
        Ok(())
    }

    async fn run_cycle(&self) {
        self.emit_event(SchedulerEvent::CycleStarted);

        match self.orchestrator.perform_update_cycle().await {
            Ok(outcome) => {
                match &outcome {
                    CycleOutcome::NoBackends => debug!("Cycle complete: no services"),
                    CycleOutcome::Unchanged { .. } => debug!("Cycle complete: unchanged"),
                    CycleOutcome::Updated {
                        addresses,
                        attempted,
                        skipped,
                    } => info!(
                        ipv4 = %addresses.ipv4_display(),
                        ipv6 = %addresses.ipv6_display(),
                        attempted,
                        skipped = skipped.len(),
                        "Cycle complete: updated"
                    ),
                }
                self.emit_event(SchedulerEvent::CycleCompleted { outcome });
            }
            Err(e) => {
                error!(kind = ?e.kind(), error = %e, "Update cycle failed");
                self.emit_event(SchedulerEvent::CycleFailed {
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(TrySendError::Full(_)) = tx.try_send(event) {
                warn!("Scheduler event channel full, dropping event");
            }
        }
    }
}

/// Repeating timer whose first tick is one full period from now
fn arm(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
