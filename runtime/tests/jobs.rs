//! Recurring jobs run through the pool against the in-memory engine.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use pasajes_core::period::Period;
use pasajes_runtime::jobs::{DeadlineScanJob, GenerateQuotaJob};
use pasajes_runtime::{JobPool, Scheduler};
use pasajes_testing::{Harness, at};
use std::sync::Arc;
use std::time::Duration;

const DRAIN: Duration = Duration::from_secs(5);

#[tokio::test]
async fn generation_job_fills_the_current_month() {
    let h = Harness::start().await;
    h.clock.set(at(2025, 2, 3, 9));
    let pool = JobPool::new(2, 8);

    pool.submit(GenerateQuotaJob::current(h.engine.clone())).unwrap();
    pool.shutdown(DRAIN).await.unwrap();

    let february = Period::new(2025, 2).unwrap();
    let items = h
        .engine
        .quota()
        .items_held_by(h.roster.titular.id, 2025, 2)
        .await
        .unwrap();
    assert_eq!(items.len(), february.weekly_windows().len());
}

#[tokio::test]
async fn generation_job_is_idempotent() {
    let h = Harness::start().await;
    let before = h.items_held_by(h.roster.titular.id).await;
    let pool = JobPool::new(1, 8);

    pool.submit(GenerateQuotaJob::new(h.engine.clone(), Harness::period())).unwrap();
    pool.submit(GenerateQuotaJob::new(h.engine.clone(), Harness::period())).unwrap();
    pool.shutdown(DRAIN).await.unwrap();

    assert_eq!(h.items_held_by(h.roster.titular.id).await, before);
}

#[tokio::test]
async fn deadline_job_publishes_alerts() {
    let h = Harness::start().await;
    let request = h.emitted_request("930-100").await;
    h.events.clear();
    h.clock.set(at(2025, 1, 18, 9));
    let pool = JobPool::new(1, 8);

    pool.submit(DeadlineScanJob::new(h.engine.clone())).unwrap();
    pool.shutdown(DRAIN).await.unwrap();

    assert_eq!(h.events.names(), vec!["liquidation_deadline_approaching"]);
    assert!(format!("{:?}", h.events.events()).contains(&request.code));
}

#[tokio::test]
async fn a_failed_scan_does_not_stop_the_next_one() {
    let h = Harness::start().await;
    h.emitted_request("930-101").await;
    h.events.clear();
    h.clock.set(at(2025, 1, 22, 9));
    let pool = JobPool::new(1, 8);

    // Two failures exhaust the read retry of the first scan only.
    h.storage.fail_next_begins(2);
    pool.submit(DeadlineScanJob::new(h.engine.clone())).unwrap();
    pool.submit(DeadlineScanJob::new(h.engine.clone())).unwrap();
    pool.shutdown(DRAIN).await.unwrap();

    assert_eq!(h.events.names(), vec!["liquidation_deadline_approaching"]);
}

#[tokio::test]
async fn scheduler_submits_both_jobs_per_tick() {
    let h = Harness::start().await;
    let pool = Arc::new(JobPool::new(1, 8));
    let scheduler = Scheduler::new(Arc::clone(&pool), h.engine.clone(), Duration::from_secs(3600));

    assert_eq!(scheduler.tick(), 2);
    pool.shutdown(DRAIN).await.unwrap();
    assert_eq!(scheduler.tick(), 0);
}

#[tokio::test]
async fn scheduler_runs_until_stopped() {
    let h = Harness::start().await;
    h.emitted_request("930-102").await;
    h.events.clear();
    h.clock.set(at(2025, 2, 1, 9));
    let pool = Arc::new(JobPool::new(2, 8));
    let scheduler = Scheduler::new(Arc::clone(&pool), h.engine.clone(), Duration::from_secs(3600));

    scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(50)))
        .await;
    pool.shutdown(DRAIN).await.unwrap();

    assert!(
        h.events
            .names()
            .contains(&"liquidation_deadline_approaching")
    );
    let february = h
        .engine
        .quota()
        .items_held_by(h.roster.titular.id, 2025, 2)
        .await
        .unwrap();
    assert!(!february.is_empty());
}
