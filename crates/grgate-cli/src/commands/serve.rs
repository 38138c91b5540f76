//! Webhook server with a worker pool behind it, plus the metrics listener.

use std::sync::Arc;

use anyhow::{Context, Result};
use grgate_api::{AppState, serve_metrics, shutdown_signal};
use grgate_config::MainConfig;
use grgate_scheduler::WorkerPool;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub async fn serve(config: MainConfig) -> Result<()> {
    let platform = grgate_platforms::new_platform(&config, config.platform)
        .with_context(|| format!("Failed to create {} client", config.platform))?;

    if config.webhook_secret().is_none() {
        warn!(platform = %config.platform, "No webhook secret configured, events are not authenticated");
    }

    let metrics = grgate_api::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let pool = WorkerPool::new(config.workers, cancel_rx.clone());
    let state = AppState::new(platform, Arc::new(config.clone()), pool.job_queue());
    let _workers = pool.start();

    let listener = TcpListener::bind(&config.server.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_address))?;
    let metrics_listener = TcpListener::bind(&config.server.metrics_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.metrics_address))?;

    let mut metrics_cancel = cancel_rx;
    tokio::spawn(async move {
        let shutdown = async move {
            let _ = metrics_cancel.wait_for(|cancelled| *cancelled).await;
        };
        if let Err(e) = serve_metrics(metrics, metrics_listener, shutdown).await {
            error!(error = %e, "Metrics server error");
        }
    });

    grgate_api::serve(state, listener, async move {
        shutdown_signal().await;
        info!("Shutting down worker pool...");
        let _ = cancel_tx.send(true);
    })
    .await
    .context("Server error")?;

    Ok(())
}
