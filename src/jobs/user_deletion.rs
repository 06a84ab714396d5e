//! User deletion worker.
//!
//! Polls the deletion queue through [`UserService::dequeue_and_delete`]
//! until told to stop. An idle queue is polled every `poll_interval`; a
//! failed poll waits `error_backoff` before the next attempt. A full batch
//! is followed immediately by the next one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DELETION_ERROR_BACKOFF_MS};
use crate::errors::AppResult;
use crate::services::UserService;

/// Totals for one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub batches: u64,
    pub deleted: u64,
    pub failed_polls: u64,
}

pub struct DeletionWorker {
    users: Arc<dyn UserService>,
    batch_size: i64,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl DeletionWorker {
    pub fn new(users: Arc<dyn UserService>, config: &Config) -> Self {
        Self {
            users,
            batch_size: config.deletion_batch_size,
            poll_interval: config.deletion_poll_interval,
            error_backoff: Duration::from_millis(DELETION_ERROR_BACKOFF_MS),
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Process a single batch.
    pub async fn tick(&self) -> AppResult<usize> {
        self.users.dequeue_and_delete(self.batch_size).await
    }

    /// Poll until `shutdown` completes. A batch in progress is finished first.
    pub async fn run_until<S>(&self, shutdown: S) -> WorkerStats
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();

        loop {
            let pause = match self.tick().await {
                Ok(0) => self.poll_interval,
                Ok(deleted) => {
                    tracing::info!(deleted, "Deletion batch processed");
                    stats.deleted += deleted as u64;
                    Duration::ZERO
                }
                Err(e) => {
                    tracing::warn!(error = %e, backoff = ?self.error_backoff, "Deletion poll failed");
                    stats.failed_polls += 1;
                    self.error_backoff
                }
            };
            stats.batches += 1;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(
            batches = stats.batches,
            deleted = stats.deleted,
            failed_polls = stats.failed_polls,
            "Deletion worker stopped"
        );
        stats
    }
}
