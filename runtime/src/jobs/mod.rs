//! Bounded background job pool.
//!
//! Jobs are queued on a bounded channel and picked up by a fixed number of
//! worker tasks. Submission never waits: a full queue is reported to the
//! caller. Shutdown stops intake, lets the workers drain what is already
//! queued, then waits for them.

mod deadline;
mod quota;

pub use deadline::DeadlineScanJob;
pub use quota::GenerateQuotaJob;

use crate::metrics::JobMetrics;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

/// Errors from submitting to or stopping the pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    /// Every queue slot is taken
    #[error("Job queue is full")]
    QueueFull,

    /// The pool no longer accepts jobs
    #[error("Job pool is shutting down")]
    ShuttingDown,

    /// Shutdown timed out with jobs still queued or running
    #[error("Shutdown timed out with {0} jobs still pending")]
    ShutdownTimeout(usize),
}

// ═══════════════════════════════════════════════════════════════════════
// Job
// ═══════════════════════════════════════════════════════════════════════

/// A unit of background work.
pub trait Job: Send + 'static {
    /// Stable name for logs and metric labels.
    fn name(&self) -> &'static str;

    /// Run the job to completion.
    fn run(self: Box<Self>) -> BoxFuture<'static, anyhow::Result<()>>;
}

enum Envelope {
    Run(Box<dyn Job>),
    Stop,
}

/// Guard that decrements an atomic counter on drop
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl AtomicCounterGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pool
// ═══════════════════════════════════════════════════════════════════════

/// Fixed set of workers fed by a bounded queue.
pub struct JobPool {
    sender: mpsc::Sender<Envelope>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    shutdown: Arc<AtomicBool>,
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl JobPool {
    /// Spawn `workers` worker tasks over a queue of `capacity` slots.
    ///
    /// Both values are raised to at least one. Must be called from within
    /// a Tokio runtime.
    #[must_use]
    pub fn new(workers: usize, capacity: usize) -> Self {
        let worker_count = workers.max(1);
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let queued = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));

        let handles = (0..worker_count)
            .map(|worker| {
                let counters = Counters {
                    queued: Arc::clone(&queued),
                    running: Arc::clone(&running),
                };
                tokio::spawn(work(worker, Arc::clone(&receiver), counters))
            })
            .collect();

        tracing::info!(workers = worker_count, capacity = capacity.max(1), "Job pool started");

        Self {
            sender,
            workers: Mutex::new(handles),
            worker_count,
            shutdown: Arc::new(AtomicBool::new(false)),
            queued,
            running,
        }
    }

    /// Queue a job without waiting.
    ///
    /// # Errors
    ///
    /// - [`JobError::QueueFull`]: every slot is taken
    /// - [`JobError::ShuttingDown`]: [`JobPool::shutdown`] has begun
    pub fn submit<J: Job>(&self, job: J) -> Result<(), JobError> {
        let name = job.name();
        if self.shutdown.load(Ordering::Acquire) {
            JobMetrics::record_rejected(name, "shutting_down");
            return Err(JobError::ShuttingDown);
        }

        // Counted before sending so a fast worker never sees it negative.
        self.queued.fetch_add(1, Ordering::SeqCst);
        let sent = self.sender.try_send(Envelope::Run(Box::new(job)));
        if sent.is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }

        match sent {
            Ok(()) => {
                tracing::debug!(job = name, "Job queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(job = name, "Job queue full, job rejected");
                JobMetrics::record_rejected(name, "queue_full");
                Err(JobError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                JobMetrics::record_rejected(name, "shutting_down");
                Err(JobError::ShuttingDown)
            }
        }
    }

    /// Jobs waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Jobs currently executing.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Stop intake, drain queued jobs and wait for the workers.
    ///
    /// Queued jobs run before the workers stop. Calling this again after a
    /// completed shutdown returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::ShutdownTimeout`] with the number of jobs still
    /// queued or running if `timeout` elapses first. The workers keep going
    /// in the background in that case.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), JobError> {
        tracing::info!("Initiating job pool shutdown");
        metrics::counter!("pasajes.jobs.shutdown.initiated").increment(1);

        self.shutdown.store(true, Ordering::Release);

        let drain = async {
            // One stop marker per worker, queued behind every pending job.
            for _ in 0..self.worker_count {
                if self.sender.send(Envelope::Stop).await.is_err() {
                    break;
                }
            }
            let handles = std::mem::take(&mut *self.workers.lock().await);
            for handle in handles {
                if let Err(error) = handle.await {
                    tracing::error!(error = %error, "Job worker ended abnormally");
                }
            }
        };

        if tokio::time::timeout(timeout, drain).await.is_ok() {
            tracing::info!("All jobs completed, shutdown successful");
            metrics::counter!("pasajes.jobs.shutdown.completed").increment(1);
            Ok(())
        } else {
            let pending = self.queued() + self.running();
            tracing::error!(pending_jobs = pending, "Shutdown timeout: {} jobs still pending", pending);
            metrics::counter!("pasajes.jobs.shutdown.timeout").increment(1);
            Err(JobError::ShutdownTimeout(pending))
        }
    }
}

struct Counters {
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

async fn work(worker: usize, receiver: Arc<Mutex<mpsc::Receiver<Envelope>>>, counters: Counters) {
    loop {
        let envelope = receiver.lock().await.recv().await;
        match envelope {
            Some(Envelope::Run(job)) => {
                let _running = AtomicCounterGuard::enter(&counters.running);
                counters.queued.fetch_sub(1, Ordering::SeqCst);
                execute(worker, job).await;
            }
            Some(Envelope::Stop) | None => break,
        }
    }
    tracing::debug!(worker, "Job worker stopped");
}

async fn execute(worker: usize, job: Box<dyn Job>) {
    let name = job.name();
    let started = Instant::now();

    // A panicking job must not take its worker down with it.
    let outcome = AssertUnwindSafe(async move { job.run().await })
        .catch_unwind()
        .await;

    let elapsed = started.elapsed();
    match outcome {
        Ok(Ok(())) => {
            tracing::debug!(worker, job = name, elapsed_ms = elapsed.as_millis(), "Job completed");
            JobMetrics::record_completed(name, elapsed);
        }
        Ok(Err(error)) => {
            tracing::warn!(worker, job = name, error = %format!("{error:#}"), "Job failed");
            JobMetrics::record_failed(name, elapsed);
        }
        Err(_) => {
            tracing::error!(worker, job = name, "Job panicked");
            JobMetrics::record_failed(name, elapsed);
        }
    }
}
