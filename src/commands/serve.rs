//! Serve command - Starts the HTTP server.

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::jobs::DeletionWorker;
use crate::services::{ServiceContainer, Services};

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Config) -> AppResult<()> {
    tracing::info!(backend = ?config.storage_backend, "Starting server...");

    let services = Services::from_config(&config).await?;
    let app = create_router(AppState::from_services(&services));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    let worker = args.with_worker.then(|| {
        let worker = DeletionWorker::new(services.users(), &config);
        tokio::spawn(async move {
            let stats = worker.run_until(shutdown_signal()).await;
            tracing::info!(?stats, "Deletion worker stopped");
        })
    });

    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Deletion worker task failed");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
