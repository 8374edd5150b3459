//! # Pasajes Runtime
//!
//! Process-level plumbing around the pasajes engine.
//!
//! ## Components
//!
//! - [`jobs::JobPool`]: bounded background workers with graceful shutdown
//! - [`jobs::GenerateQuotaJob`] and [`jobs::DeadlineScanJob`]: the recurring work
//! - [`schedule::Scheduler`]: submits the recurring jobs on an interval
//! - [`config::Config`]: environment-driven configuration
//! - [`telemetry`] and [`metrics`]: tracing subscriber and Prometheus exporter
//! - [`notifier::TracingEventSink`]: lifecycle events to the log
//!
//! ## Example
//!
//! ```rust,no_run
//! use pasajes_runtime::jobs::{DeadlineScanJob, JobPool};
//! # use pasajes_core::{Engine, Storage};
//! # use std::time::Duration;
//!
//! # async fn example<S: Storage>(engine: Engine<S>) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = JobPool::new(5, 200);
//! pool.submit(DeadlineScanJob::new(engine))?;
//! pool.shutdown(Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod jobs;
pub mod metrics;
pub mod notifier;
pub mod schedule;
pub mod telemetry;

pub use config::Config;
pub use jobs::{Job, JobError, JobPool};
pub use notifier::TracingEventSink;
pub use schedule::Scheduler;
