//! vs-server: the HTTP streaming service.
//!
//! This crate ties the store, the byte source and the broker together into
//! a running server:
//!
//! - Axum router serving `GET /video`, `/health` and `/metrics`
//! - Background publisher that forwards view events to the broker
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod publisher;
pub mod router;
pub mod routes;
pub mod source;

use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use vs_broker::{AmqpBroadcaster, Broadcaster, FanoutBus};
use vs_core::config::{BrokerConfig, Config};
use vs_core::Error;
use vs_db::{SqliteVideoStore, VideoLookup};

use crate::context::AppContext;
use crate::publisher::ViewPublisher;
use crate::source::VideoSource;

/// Start the vidstream server and run until a shutdown signal arrives.
pub async fn start(config: Config) -> vs_core::Result<()> {
    start_with_cancel(config, CancellationToken::new()).await
}

/// Like [`start`], but also stops when `cancel` is triggered.
///
/// Every collaborator is built here once: a failure to reach the storage
/// root, the store or the broker aborts startup.
pub async fn start_with_cancel(config: Config, cancel: CancellationToken) -> vs_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let source = VideoSource::new(
        &config.storage.video_root,
        config.storage.effective_chunk_size(),
    )?;
    tracing::info!("Serving videos from {}", source.root().display());

    let db_path = config.store.db_path();
    let pool = vs_db::pool::init_pool(&db_path)?;
    tracing::info!("Metadata store opened at {}", db_path.display());
    let store: Arc<dyn VideoLookup> = Arc::new(SqliteVideoStore::new(pool));

    let broadcaster = connect_broadcaster(&config.broker).await?;

    // Stopped only after the listener has, so late views are still flushed.
    let publisher_cancel = CancellationToken::new();
    let (publisher, rx) = ViewPublisher::channel(config.broker.effective_queue_capacity());
    let publisher_handle = tokio::spawn(publisher::run_publisher(
        rx,
        broadcaster,
        publisher_cancel.clone(),
    ));

    let mut ctx = AppContext::new(store, Arc::new(source), publisher);
    if let Some(handle) = install_metrics_recorder() {
        ctx = ctx.with_metrics(handle);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let result = serve(listener, router::build_router(ctx), cancel).await;

    publisher_cancel.cancel();
    if let Err(e) = publisher_handle.await {
        tracing::warn!("View publisher task failed: {e}");
    }

    tracing::info!("Server shutdown complete");
    result
}

/// Serve `app` on an already-bound listener until shutdown.
///
/// In-flight responses are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> vs_core::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!("Listening on {local}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

async fn connect_broadcaster(config: &BrokerConfig) -> vs_core::Result<Arc<dyn Broadcaster>> {
    match &config.address {
        Some(address) => {
            let amqp = AmqpBroadcaster::connect(address, &config.exchange).await?;
            Ok(Arc::new(amqp))
        }
        None => {
            tracing::warn!("No broker address configured; view events stay in-process");
            Ok(Arc::new(FanoutBus::default()))
        }
    }
}

fn install_metrics_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            metrics::describe_counter!(
                "vidstream_streams_started_total",
                "Video streams that passed lookup and open"
            );
            metrics::describe_counter!(
                "vidstream_stream_errors_total",
                "Stream requests that failed after the id was accepted"
            );
            metrics::describe_counter!(
                "vidstream_views_published_total",
                "View events delivered to the broker"
            );
            metrics::describe_counter!(
                "vidstream_views_dropped_total",
                "View events that were never delivered"
            );
            metrics::describe_gauge!("vidstream_active_streams", "Open stream sessions");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("Metrics recorder not installed: {e}");
            None
        }
    }
}

/// Wait for SIGINT, SIGTERM or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
