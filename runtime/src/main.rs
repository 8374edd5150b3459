//! Pasajes background worker.
//!
//! Keeps every titular's monthly quota generated and raises
//! liquidation-deadline alerts on a fixed interval.

use anyhow::Context;
use pasajes_core::{Engine, Environment, SystemClock};
use pasajes_postgres::PostgresStorage;
use pasajes_runtime::metrics::MetricsServer;
use pasajes_runtime::{Config, JobPool, Scheduler, TracingEventSink, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

/// Time allowed for queued jobs to finish after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();

    telemetry::init()?;
    info!("Starting pasajes worker");

    let config = Config::from_env();
    info!(
        workers = config.workers.count,
        queue_capacity = config.workers.queue_capacity,
        units_per_week = config.engine.units_per_week,
        scan_interval_secs = config.workers.deadline_scan_interval_secs,
        "Configuration loaded"
    );

    let mut metrics = MetricsServer::new(config.metrics_addr);
    metrics.start().context("starting metrics exporter")?;

    info!("Connecting to database...");
    let storage = PostgresStorage::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to database")?;
    storage.migrate().await.context("running migrations")?;
    info!("Database ready");

    let mut env = Environment::new(storage, Arc::new(SystemClock))
        .with_events(Arc::new(TracingEventSink::new()))
        .with_policy(config.policy());
    if let Some(timeout) = config.operation_timeout() {
        env = env.with_timeout(timeout);
    }
    let engine = Engine::new(env);

    let pool = Arc::new(JobPool::new(config.workers.count, config.workers.queue_capacity));
    let scheduler = Scheduler::new(Arc::clone(&pool), engine, config.deadline_scan_interval());

    scheduler.run_until(shutdown_signal()).await;

    pool.shutdown(SHUTDOWN_TIMEOUT).await?;
    info!("Pasajes worker stopped");
    Ok(())
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(error = %error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(error = %error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
