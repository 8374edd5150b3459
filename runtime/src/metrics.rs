//! Prometheus metrics for observability and monitoring.
//!
//! The engine records counters for every component (sequence codes, quota
//! generation and transfers, request transitions, liquidation compensation
//! failures, storage contention); the job pool adds its own. This module
//! describes them and serves them for Prometheus scraping.
//!
//! # Example
//!
//! ```rust,no_run
//! use pasajes_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter (including binding its listener)
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global recorder and spawn the HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or bound, or the
    /// recorder cannot be installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and leaves the existing recorder in place.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0],
            )
            .and_then(PrometheusBuilder::build)
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        match metrics::set_global_recorder(recorder) {
            Ok(()) => {
                tokio::spawn(async move {
                    if let Err(error) = exporter.await {
                        tracing::error!(error = ?error, "Metrics listener stopped");
                    }
                });
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Engine
    describe_counter!("pasajes.sequence.issued", "Sequence codes issued, by document type");
    describe_counter!(
        "pasajes.quota.items_generated",
        "Quota items created by period generation"
    );
    describe_counter!("pasajes.quota.transfers", "Quota items handed to an alternate");
    describe_counter!("pasajes.requests.created", "Travel requests filed");
    describe_counter!(
        "pasajes.requests.transitions",
        "Request state transitions, by target state"
    );
    describe_counter!(
        "pasajes.liquidation.compensation_failures",
        "Liquidation steps whose request-side step exhausted its retries"
    );
    describe_counter!(
        "pasajes.deadline.alerts",
        "Liquidation deadline alerts raised by the scan"
    );
    describe_counter!(
        "pasajes.operations.timeouts",
        "Engine operations aborted by the operation timeout"
    );
    describe_counter!(
        "pasajes.storage.transient_errors",
        "Retryable storage failures (contention, connection)"
    );
    describe_counter!("pasajes.events.published", "Lifecycle events handed to the sink");

    // Jobs
    describe_counter!("pasajes.jobs.completed", "Background jobs that finished");
    describe_counter!(
        "pasajes.jobs.failed",
        "Background jobs that returned an error or panicked"
    );
    describe_counter!(
        "pasajes.jobs.rejected",
        "Job submissions refused (queue full or shutting down)"
    );
    describe_histogram!("pasajes.jobs.duration_seconds", "Time taken to run a job");
}

/// Job pool metrics recorder.
pub struct JobMetrics;

impl JobMetrics {
    /// Record a completed job.
    pub fn record_completed(job: &'static str, duration: Duration) {
        counter!("pasajes.jobs.completed", "job" => job).increment(1);
        histogram!("pasajes.jobs.duration_seconds", "job" => job).record(duration.as_secs_f64());
    }

    /// Record a failed or panicked job.
    pub fn record_failed(job: &'static str, duration: Duration) {
        counter!("pasajes.jobs.failed", "job" => job).increment(1);
        histogram!("pasajes.jobs.duration_seconds", "job" => job).record(duration.as_secs_f64());
    }

    /// Record a refused submission.
    pub fn record_rejected(job: &'static str, reason: &'static str) {
        counter!("pasajes.jobs.rejected", "job" => job, "reason" => reason).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_server_creation() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn test_metrics_server_renders_job_metrics() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        JobMetrics::record_completed("deadline_scan", Duration::from_millis(20));
        JobMetrics::record_rejected("generate_quota", "queue_full");

        // Another test may have installed the recorder first; metrics are
        // still recorded, just not through this handle.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("pasajes_jobs_completed"));
            assert!(rendered.contains("pasajes_jobs_rejected"));
        }
    }

    #[tokio::test]
    async fn test_second_start_is_tolerated() {
        let mut first = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        let mut second = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        first.start().unwrap();
        assert!(second.start().is_ok());
        assert!(second.handle().is_none());
    }
}
