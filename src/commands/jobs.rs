//! Jobs command - The user deletion pipeline.
//!
//! ```bash
//! # Poll the deletion queue until Ctrl+C
//! cargo run -- jobs work
//!
//! # Queue a user for deletion
//! cargo run -- jobs enqueue-deletion 01890a5d-ac96-774b-bcce-b302099a8057
//! ```

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::{Config, StorageBackend};
use crate::errors::AppResult;
use crate::jobs::DeletionWorker;
use crate::services::{clamp_batch_size, ServiceContainer, Services};

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    if config.storage_backend == StorageBackend::Memory {
        tracing::warn!("In-memory queue is private to this process; use `serve --with-worker`");
    }

    let services = Services::from_config(&config).await?;

    match args.action {
        JobsAction::Work => run_worker(&services, &config).await,
        JobsAction::EnqueueDeletion { user_id } => {
            let message_id = services.users().enqueue_deletion(user_id).await?;
            println!("Queued deletion of {} as message {}", user_id, message_id);
            Ok(())
        }
        JobsAction::Drain { batch_size } => {
            let batch_size = batch_size.unwrap_or(config.deletion_batch_size);
            let deleted = services.users().dequeue_and_delete(batch_size).await?;
            println!(
                "Deleted {} user(s) from a batch of up to {}",
                deleted,
                clamp_batch_size(batch_size)
            );
            Ok(())
        }
    }
}

async fn run_worker(services: &Services, config: &Config) -> AppResult<()> {
    let worker = DeletionWorker::new(services.users(), config);

    tracing::info!(
        queue = %config.deletion_queue_name,
        batch_size = config.deletion_batch_size,
        "Deletion worker started. Press Ctrl+C to stop."
    );

    let stats = worker
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, stopping worker...");
        })
        .await;

    tracing::info!(
        batches = stats.batches,
        deleted = stats.deleted,
        failed_polls = stats.failed_polls,
        "Deletion worker stopped"
    );
    Ok(())
}
