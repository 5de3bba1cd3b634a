//! Nginx Request Exporter
//!
//! This crate provides the exporter server: it receives Nginx access log lines over syslog
//! or by tailing a file, turns the numeric values embedded in them into Prometheus
//! histograms, and serves those over HTTP.
//!
//! # Architecture
//!
//! The exporter is built on Axum and Tokio, providing:
//! - A syslog listener (UDP or Unix datagram) or an access log tailer
//! - A line pipeline feeding the shared histogram registry
//! - The Prometheus telemetry endpoint, a landing page and a JSON instrument listing
//!
//! # Example
//!
//! ```no_run
//! use exporter::{run_server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server(Config::default()).await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod ingest;
pub mod metrics;
mod routes;
mod state;

pub use config::{Config, ConfigError, IngestSource, SyslogAddress, DEFAULT_NAMESPACE};
pub use routes::InstrumentListResponse;
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use ingest::{line_channel, FileTailer, Pipeline, SyslogListener};
use metrics::ExporterMetrics;
use shared::registry::MetricRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Runs the exporter with the provided configuration.
///
/// Starts the configured transport, the line pipeline and the HTTP server, and runs until
/// SIGTERM/SIGINT. On shutdown the transport stops, lines already queued are still
/// recorded, and in-flight HTTP requests are completed.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - The syslog socket, access log or HTTP listener cannot be opened
/// - A fatal error occurs during operation
pub async fn run_server(config: Config) -> Result<()> {
    config.validate_config()?;
    let addr = config.listen_socket_addr()?;

    tracing::info!(
        listen_address = %config.listen_address,
        telemetry_path = %config.telemetry_path,
        buckets = %config.buckets,
        "Nginx request exporter starting"
    );

    let registry = Arc::new(
        MetricRegistry::new(config.namespace.clone(), config.buckets.clone())
            .context("Failed to create metric registry")?,
    );
    let metrics = ExporterMetrics::register(registry.prometheus_registry(), &config.namespace)
        .context("Failed to register exporter metrics")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (line_tx, line_rx) = line_channel();

    let pipeline = tokio::spawn(Pipeline::new(Arc::clone(&registry), metrics.clone()).run(line_rx));

    let transport = match config.ingest_source() {
        IngestSource::File(path) => {
            let tailer = FileTailer::open(&path, config.poll_interval())
                .await
                .with_context(|| format!("Failed to open access log {}", path.display()))?;
            tokio::spawn(tailer.run(line_tx, shutdown_rx.clone()))
        }
        IngestSource::Syslog(address) => {
            let listener = SyslogListener::bind(&address, config.syslog_tag.clone(), metrics)
                .await
                .with_context(|| format!("Failed to listen for syslog on {address:?}"))?;
            tokio::spawn(listener.run(line_tx, shutdown_rx.clone()))
        }
    };

    let app = create_router(AppState::new(registry, &config.telemetry_path));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(%addr, "Listening for connections");

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_tx.send_replace(true);
    });

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_shutdown.wait_for(|&stop| stop).await.ok();
        })
        .await?;

    if let Err(e) = transport.await {
        tracing::error!(error = %e, "Transport task failed");
    }
    if let Err(e) = pipeline.await {
        tracing::error!(error = %e, "Pipeline task failed");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
