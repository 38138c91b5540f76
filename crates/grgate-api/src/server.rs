//! HTTP server lifecycle.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{AppState, routes};

/// How long open connections may take to finish once shutdown starts.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serve the API on `listener` until `shutdown` resolves, then drain open
/// connections for at most [`DRAIN_TIMEOUT`].
pub async fn serve<F>(state: AppState, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Server started");
    }

    let (draining_tx, mut draining_rx) = watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutting down server...");
            let _ = draining_tx.send(true);
        })
        .into_future();

    tokio::select! {
        biased;
        result = server => result,
        _ = async {
            if draining_rx.wait_for(|draining| *draining).await.is_ok() {
                tokio::time::sleep(DRAIN_TIMEOUT).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!("Connections still open after drain timeout, closing");
            Ok(())
        }
    }
}

/// Serve the Prometheus scrape endpoint on `listener` until `shutdown` resolves.
pub async fn serve_metrics<F>(
    handle: PrometheusHandle,
    listener: TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Metrics server started");
    }

    axum::serve(listener, crate::metrics::router(handle))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grgate_config::MainConfig;
    use grgate_core::fakes::MemoryPlatform;
    use std::sync::Arc;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (job_queue, _jobs) = mpsc::channel(1);
        let state = AppState::new(
            Arc::new(MemoryPlatform::default()),
            Arc::new(MainConfig::default()),
            job_queue,
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(serve(state, listener, async move {
            let _ = stop_rx.await;
        }));
        stop_tx.send(()).unwrap();

        timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
