//! Periodic update scheduling.
//!
//! [`UpdateScheduler`] runs one repeating job at a fixed interval. It is
//! either idle (no job) or armed (a job fires immediately and then every
//! `frequency`). Rescheduling cancels the running job before arming a new
//! one, and ticks are serialised through a shared gate so that no two ticks
//! ever run at the same time, even across a reschedule.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Interval used when none is configured.
pub const DEFAULT_FREQUENCY: Duration = Duration::from_secs(60);

/// Smallest interval the dashboard accepts from the user. Not enforced here.
pub const MIN_FREQUENCY: Duration = Duration::from_secs(5);

// tokio::time::interval panics on a zero period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Work executed on every tick.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    async fn run(&self);
}

/// Runs a [`PeriodicJob`] at a configurable interval.
pub struct UpdateScheduler {
    job: Arc<dyn PeriodicJob>,
    runtime: Handle,
    frequency: Mutex<Duration>,
    task: Mutex<Option<JoinHandle<()>>>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl UpdateScheduler {
    /// Create an idle scheduler that spawns ticks on `runtime`.
    pub fn new(job: Arc<dyn PeriodicJob>, runtime: Handle, frequency: Duration) -> Self {
        Self {
            job,
            runtime,
            frequency: Mutex::new(frequency),
            task: Mutex::new(None),
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Arm the scheduler. The first tick runs immediately.
    ///
    /// Does nothing if already armed.
    pub fn init(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("scheduled updates already armed");
            return;
        }
        let frequency = *self.frequency.lock();
        *task = Some(self.spawn(frequency));
        info!(frequency_secs = frequency.as_secs(), "scheduled updates armed");
    }

    /// Cancel the job, interrupting a tick that is in flight.
    pub fn cancel_future_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("scheduled updates cancelled");
        }
    }

    /// Change the interval.
    ///
    /// When armed, the current job is cancelled and a new one armed at the
    /// new interval, starting with an immediate tick. When idle, the value is
    /// kept for the next [`init`](Self::init).
    pub fn update_frequency(&self, frequency: Duration) {
        let mut task = self.task.lock();
        *self.frequency.lock() = frequency;
        if let Some(old) = task.take() {
            old.abort();
            *task = Some(self.spawn(frequency));
            info!(frequency_secs = frequency.as_secs(), "scheduled updates rearmed");
        } else {
            debug!(frequency_secs = frequency.as_secs(), "frequency stored for next arm");
        }
    }

    /// Whether a job is currently armed.
    pub fn has_future_task(&self) -> bool {
        self.task.lock().is_some()
    }

    pub fn frequency(&self) -> Duration {
        *self.frequency.lock()
    }

    fn spawn(&self, frequency: Duration) -> JoinHandle<()> {
        let job = self.job.clone();
        let gate = self.gate.clone();
        let period = frequency.max(MIN_PERIOD);

        self.runtime.spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;
                let _tick = gate.lock().await;
                run_tick(job.as_ref()).await;
            }
        })
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("frequency", &self.frequency())
            .field("armed", &self.has_future_task())
            .finish()
    }
}

/// Run one tick. A panic inside the job is logged and swallowed so later
/// ticks still fire.
async fn run_tick(job: &dyn PeriodicJob) {
    if let Err(panic) = AssertUnwindSafe(job.run()).catch_unwind().await {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(reason = %reason, "scheduled update panicked");
    }
}
