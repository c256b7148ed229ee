//! Fixed-interval job scheduler with single-instance semantics
//!
//! - The first run starts immediately, then one run per interval.
//! - At most one run is in flight. A tick (or manual trigger) that fires
//!   while a run is still going is dropped, never queued.
//! - The interval can be changed at runtime; the next run is then one new
//!   interval from the moment of the change.
//! - Shutdown stops ticking and gives an in-flight run a grace period to
//!   finish before it is abandoned.
//!
//! Dropping the [`SchedulerHandle`] without calling
//! [`shutdown`](SchedulerHandle::shutdown) also stops the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Longest interval the scheduler accepts
pub const MAX_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

fn check_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::invalid_input("Scheduler interval must be > 0"));
    }
    if interval > MAX_INTERVAL {
        return Err(Error::invalid_input(format!(
            "Scheduler interval must be at most {}s, got {}s",
            MAX_INTERVAL.as_secs(),
            interval.as_secs()
        )));
    }
    Ok(())
}

/// Work the scheduler runs on every tick
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run(&self);
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    skipped: AtomicU64,
}

/// Cloneable control surface for a running scheduler
#[derive(Clone)]
pub struct SchedulerControl {
    interval_tx: Arc<watch::Sender<Duration>>,
    trigger: Arc<Notify>,
}

impl SchedulerControl {
    /// Change the interval; the next run is `interval` from now
    pub fn reschedule(&self, interval: Duration) -> Result<()> {
        check_interval(interval)?;
        let previous = self.interval_tx.send_replace(interval);
        if previous != interval {
            info!(
                "Check interval changed: {}s -> {}s",
                previous.as_secs(),
                interval.as_secs()
            );
        }
        Ok(())
    }

    /// Current interval
    pub fn interval(&self) -> Duration {
        *self.interval_tx.borrow()
    }

    /// Request an immediate run (dropped if one is already in flight)
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }
}

/// Owner handle for a running scheduler
pub struct SchedulerHandle {
    control: SchedulerControl,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    running: Arc<Mutex<()>>,
    counters: Arc<Counters>,
}

impl SchedulerHandle {
    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    pub fn reschedule(&self, interval: Duration) -> Result<()> {
        self.control.reschedule(interval)
    }

    pub fn interval(&self) -> Duration {
        self.control.interval()
    }

    pub fn trigger_now(&self) {
        self.control.trigger_now();
    }

    /// Runs started so far
    pub fn runs_started(&self) -> u64 {
        self.counters.started.load(Ordering::SeqCst)
    }

    /// Triggers dropped because a run was in flight
    pub fn runs_skipped(&self) -> u64 {
        self.counters.skipped.load(Ordering::SeqCst)
    }

    /// Stop ticking and wait up to `grace` for an in-flight run.
    ///
    /// Returns `false` if a run was still going when the grace period ended,
    /// or if the loop had already died.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let _ = self.shutdown_tx.send(());
        let loop_ok = match self.task.await {
            Ok(()) => true,
            Err(e) => {
                warn!("Scheduler loop ended abnormally: {}", e);
                false
            }
        };

        match tokio::time::timeout(grace, self.running.lock()).await {
            Ok(_) => {
                info!("Scheduler stopped");
                loop_ok
            }
            Err(_) => {
                warn!(
                    "Check cycle still running after {:?}, abandoning it",
                    grace
                );
                false
            }
        }
    }
}

/// Spawns scheduler loops onto the current tokio runtime
pub struct Scheduler;

impl Scheduler {
    /// Start running `job` now and every `interval` after
    pub fn spawn(job: Arc<dyn ScheduledJob>, interval: Duration) -> Result<SchedulerHandle> {
        check_interval(interval)?;

        let (interval_tx, interval_rx) = watch::channel(interval);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let trigger = Arc::new(Notify::new());
        let running = Arc::new(Mutex::new(()));
        let counters = Arc::new(Counters::default());

        let task = tokio::spawn(run_loop(
            job,
            interval_rx,
            trigger.clone(),
            shutdown_rx,
            running.clone(),
            counters.clone(),
        ));

        info!("Scheduler started, interval {}s", interval.as_secs());

        Ok(SchedulerHandle {
            control: SchedulerControl {
                interval_tx: Arc::new(interval_tx),
                trigger,
            },
            shutdown_tx,
            task,
            running,
            counters,
        })
    }
}

async fn run_loop(
    job: Arc<dyn ScheduledJob>,
    mut interval_rx: watch::Receiver<Duration>,
    trigger: Arc<Notify>,
    mut shutdown_rx: oneshot::Receiver<()>,
    running: Arc<Mutex<()>>,
    counters: Arc<Counters>,
) {
    let mut period = *interval_rx.borrow_and_update();
    let mut ticker = interval_at(Instant::now(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Scheduler received shutdown");
                break;
            }
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = *interval_rx.borrow_and_update();
                if next == period {
                    continue;
                }
                match Instant::now().checked_add(next) {
                    Some(start) => {
                        period = next;
                        ticker = interval_at(start, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                    None => warn!(
                        "Interval {}s is out of range, keeping {}s",
                        next.as_secs(),
                        period.as_secs()
                    ),
                }
            }
            _ = ticker.tick() => fire(&job, &running, &counters),
            _ = trigger.notified() => fire(&job, &running, &counters),
        }
    }
}

fn fire(job: &Arc<dyn ScheduledJob>, running: &Arc<Mutex<()>>, counters: &Counters) {
    match running.clone().try_lock_owned() {
        Ok(guard) => {
            counters.started.fetch_add(1, Ordering::SeqCst);
            let job = job.clone();
            tokio::spawn(async move {
                job.run().await;
                drop(guard);
            });
        }
        Err(_) => {
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            warn!("Previous check cycle still running, skipping this trigger");
        }
    }
}
