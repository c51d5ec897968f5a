//! Periodic retention sweep.

use crate::engine::MemoryEngine;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Deletes records older than `max_age` every `interval`, through the
/// engine's normal write path.
pub struct RetentionSweeper {
    engine: Arc<MemoryEngine>,
    max_age: ChronoDuration,
    interval: Duration,
}

/// Handle to a running sweeper. Dropping it also stops the loop.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RetentionSweeper {
    pub fn new(engine: Arc<MemoryEngine>, max_age: ChronoDuration, interval: Duration) -> Self {
        Self {
            engine,
            max_age,
            interval,
        }
    }

    /// Run one sweep and persist the index. Errors are logged, not raised.
    pub async fn run_once(&self) -> usize {
        let removed = match self.engine.sweep(self.max_age).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Retention sweep failed");
                return 0;
            }
        };
        if let Err(e) = self.engine.persist_index().await {
            warn!(error = %e, "Failed to persist index after sweep");
        }
        removed
    }

    /// Start the background loop. The first sweep runs immediately.
    pub fn start(self) -> SweeperHandle {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            info!(
                max_age_days = self.max_age.num_days(),
                interval_secs = self.interval.as_secs(),
                "Retention sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.run_once().await;
                        debug!(removed, "Retention sweep tick");
                    }
                    _ = stop.changed() => break,
                }
            }
            info!("Retention sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

impl SweeperHandle {
    /// Stop the loop and wait for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Retention sweeper task ended abnormally");
        }
    }
}
