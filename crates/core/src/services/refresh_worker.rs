use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::quote_service::QuoteService;

/// Ticker set shared between the foreground (which edits the watchlist)
/// and the background worker (which polls it each cycle).
pub type SharedWatchlist = Arc<RwLock<BTreeSet<String>>>;

/// Background refresh driver: one tokio task on a fixed interval.
///
/// The worker is the single writer of the quote cache; the foreground
/// only reads. It is an explicit scheduled task with a shutdown signal,
/// not a fire-and-forget loop: `shutdown` lets an in-flight cycle
/// finish before the task exits, and merely dropping the handle closes
/// the signal channel, stopping the task at its next loop turn. Atomic
/// document writes keep the on-disk cache consistent even if the
/// process dies mid-cycle.
pub struct RefreshWorker;

impl RefreshWorker {
    /// Spawn the refresh loop. The first cycle runs immediately, then
    /// every `interval`. Failures are logged and retried on the next
    /// scheduled cycle only — no tight retry loop.
    pub fn spawn(
        quotes: Arc<QuoteService>,
        watchlist: SharedWatchlist,
        interval: Duration,
    ) -> RefreshWorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "refresh worker started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // Channel closed or signal sent — either way, stop.
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = timer.tick() => {
                        let tickers = watchlist
                            .read()
                            .unwrap_or_else(|e| e.into_inner())
                            .clone();
                        if tickers.is_empty() {
                            continue;
                        }
                        if let Err(e) = quotes.refresh(&tickers).await {
                            // Only storage problems abort a cycle; per-ticker
                            // upstream errors are already absorbed inside refresh.
                            error!(error = %e, "refresh cycle aborted");
                        }
                    }
                }
            }

            info!("refresh worker stopped");
        });

        RefreshWorkerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running refresh worker.
pub struct RefreshWorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshWorkerHandle {
    /// Signal the worker to stop and wait for it to finish. Any
    /// in-flight fetch completes (or is abandoned with the task);
    /// the on-disk cache stays consistent either way.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// True once the worker task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
