//! Contract Test: Scheduler Single-Instance Semantics
//!
//! Constraints verified:
//! - The first run starts immediately
//! - A trigger that fires during a run is dropped, never queued
//! - Rescheduling takes effect without restarting the loop
//! - Out-of-range intervals are rejected and the loop keeps running
//! - Shutdown waits for an in-flight run up to the grace period
//!
//! If this test fails, overlapping cycles could double-count stats.

mod common;

use common::*;
use ddns_core::Scheduler;
use ddns_core::scheduler::MAX_INTERVAL;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn first_run_is_immediate() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(1)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_secs(3600)).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(job.runs(), 1);
    assert_eq!(handle.runs_started(), 1);
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn overlapping_ticks_are_skipped() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(300)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_millis(50)).unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(job.runs(), 1, "ticks during a run must not start another");
    assert!(handle.runs_skipped() >= 1);
    assert_eq!(job.max_active.load(Ordering::SeqCst), 1);

    handle.shutdown(Duration::from_secs(1)).await;
    assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn manual_trigger_runs_when_idle_and_is_dropped_when_busy() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(200)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_secs(3600)).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.trigger_now();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(job.runs(), 1);
    assert_eq!(handle.runs_skipped(), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    handle.trigger_now();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(job.runs(), 2);

    handle.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn reschedule_takes_effect_without_restart() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(1)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_secs(3600)).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(job.runs(), 1);

    handle.reschedule(Duration::from_millis(50)).unwrap();
    assert_eq!(handle.interval(), Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(job.runs() >= 3, "got {} runs", job.runs());

    handle.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(1)));
    assert!(Scheduler::spawn(job.clone(), Duration::ZERO).is_err());

    let handle = Scheduler::spawn(job, Duration::from_secs(60)).unwrap();
    assert!(handle.reschedule(Duration::ZERO).is_err());
    assert_eq!(handle.interval(), Duration::from_secs(60));
    handle.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn oversized_interval_is_rejected_and_loop_keeps_running() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(1)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_millis(50)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(job.runs(), 1);

    assert!(handle.reschedule(Duration::from_secs(u64::MAX)).is_err());
    assert!(handle.reschedule(MAX_INTERVAL + Duration::from_secs(1)).is_err());
    assert_eq!(handle.interval(), Duration::from_millis(50));
    assert!(Scheduler::spawn(job.clone(), Duration::MAX).is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let ticked = job.runs();
    assert!(ticked >= 3, "got {} runs", ticked);

    handle.reschedule(MAX_INTERVAL).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let settled = job.runs();
    handle.trigger_now();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(job.runs(), settled + 1);

    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_run() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(150)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_secs(3600)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(handle.shutdown(Duration::from_secs(2)).await);
    assert_eq!(job.active.load(Ordering::SeqCst), 0);
    assert_eq!(job.runs(), 1);
}

#[tokio::test]
async fn shutdown_abandons_a_stuck_run_after_grace() {
    let job = Arc::new(CountingJob::new(Duration::from_secs(30)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_secs(3600)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!handle.shutdown(Duration::from_millis(50)).await);
}

#[tokio::test]
async fn no_runs_after_shutdown() {
    let job = Arc::new(CountingJob::new(Duration::from_millis(1)));
    let handle = Scheduler::spawn(job.clone(), Duration::from_millis(30)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.shutdown(Duration::from_secs(1)).await;
    let runs = job.runs();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(job.runs(), runs);
}
