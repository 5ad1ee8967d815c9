// ABOUTME: Interval scheduler that drives one workflow: init_run until it succeeds once, then run on every tick.
// ABOUTME: SchedulerControl is the shared handle used by signals and the control socket to pause, resume, stop, or retime it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use adloop_agent::Workflow;
use adloop_core::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Granularity of interval and pause waits.
const SLICE: Duration = Duration::from_secs(1);

/// Snapshot written to the status file and returned by the `status` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStatus {
    pub name: String,
    pub running: bool,
    pub paused: bool,
    pub daemon_mode: bool,
    pub step_count: u64,
    pub interval_seconds: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub next_run_time: Option<DateTime<Utc>>,
    pub uptime_seconds: f64,
    pub pid: u32,
    pub workflow: String,
    #[serde(default)]
    pub workflow_status: WorkflowStatus,
    pub last_error: Option<String>,
}

struct Shared {
    running: AtomicBool,
    paused: AtomicBool,
    interval_seconds: AtomicU64,
    wake: Notify,
    status: Mutex<SchedulerStatus>,
    status_path: Option<PathBuf>,
}

/// Cloneable handle onto a scheduler's flags and status.
#[derive(Clone)]
pub struct SchedulerControl {
    shared: Arc<Shared>,
}

impl SchedulerControl {
    pub fn new(name: &str, interval_seconds: u64, daemon_mode: bool, status_path: Option<PathBuf>) -> Self {
        let interval_seconds = interval_seconds.max(1);
        let status = SchedulerStatus {
            name: name.to_string(),
            running: true,
            paused: false,
            daemon_mode,
            step_count: 0,
            interval_seconds,
            start_time: None,
            last_run_time: None,
            next_run_time: None,
            uptime_seconds: 0.0,
            pid: std::process::id(),
            workflow: String::new(),
            workflow_status: WorkflowStatus::Initialized,
            last_error: None,
        };
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(true),
                paused: AtomicBool::new(false),
                interval_seconds: AtomicU64::new(interval_seconds),
                wake: Notify::new(),
                status: Mutex::new(status),
                status_path,
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.shared.interval_seconds.load(Ordering::SeqCst))
    }

    /// Current status with live flags and uptime.
    pub fn status(&self) -> SchedulerStatus {
        let mut status = self
            .shared
            .status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone());
        status.running = self.is_running();
        status.paused = self.is_paused();
        status.interval_seconds = self.shared.interval_seconds.load(Ordering::SeqCst);
        status.uptime_seconds = status
            .start_time
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        status
    }

    /// Ask the loop to exit after the current step.
    pub fn stop(&self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            tracing::info!("scheduler stopping");
            self.changed();
        }
    }

    /// Returns whether the scheduler was running and not already paused.
    pub fn pause(&self) -> bool {
        if !self.is_running() || self.shared.paused.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("scheduler paused");
        self.changed();
        true
    }

    /// Returns whether the scheduler was paused.
    pub fn resume(&self) -> bool {
        if !self.is_running() || !self.shared.paused.swap(false, Ordering::SeqCst) {
            return false;
        }
        tracing::info!("scheduler resumed");
        self.changed();
        true
    }

    /// Change the interval. Zero is refused.
    pub fn set_interval(&self, seconds: u64) -> bool {
        if seconds == 0 {
            return false;
        }
        self.shared.interval_seconds.store(seconds, Ordering::SeqCst);
        tracing::info!(interval_seconds = seconds, "scheduler interval changed");
        self.changed();
        true
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SchedulerStatus)) {
        match self.shared.status.lock() {
            Ok(mut status) => f(&mut status),
            Err(e) => f(&mut e.into_inner()),
        }
        self.write_status();
    }

    fn changed(&self) {
        self.shared.wake.notify_waiters();
        self.write_status();
    }

    fn write_status(&self) {
        let Some(path) = &self.shared.status_path else {
            return;
        };
        let result = serde_json::to_vec_pretty(&self.status())
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(path, bytes));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to write status file");
        }
    }

    /// Sleep one slice or until a flag changes.
    async fn nap(&self, max: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(max.min(SLICE)) => {}
            _ = self.shared.wake.notified() => {}
        }
    }
}

pub struct Scheduler {
    workflow: Box<dyn Workflow>,
    control: SchedulerControl,
    step_count: u64,
}

impl Scheduler {
    pub fn new(workflow: Box<dyn Workflow>, control: SchedulerControl) -> Self {
        control.update(|s| {
            s.workflow = workflow.name().to_string();
            s.workflow_status = workflow.status();
        });
        Self {
            workflow,
            control,
            step_count: 0,
        }
    }

    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    /// Run one workflow step. Only successful steps count, so a failed
    /// `init_run` is retried on the next tick.
    pub async fn step(&mut self) -> bool {
        let first = self.step_count == 0;
        tracing::info!(step = self.step_count + 1, init = first, "executing workflow step");
        let started = Instant::now();

        let result = if first {
            self.workflow.init_run().await
        } else {
            self.workflow.run().await
        };
        let elapsed = started.elapsed().as_secs_f64();

        let ok = match &result {
            Ok(()) => {
                self.step_count += 1;
                tracing::info!(step = self.step_count, elapsed_secs = elapsed, "workflow step succeeded");
                true
            }
            Err(e) => {
                tracing::error!(step = self.step_count + 1, elapsed_secs = elapsed, error = %e, "workflow step failed");
                false
            }
        };

        let step_count = self.step_count;
        let workflow_status = self.workflow.status();
        self.control.update(|s| {
            s.step_count = step_count;
            s.workflow_status = workflow_status;
            match &result {
                Ok(()) => {
                    s.last_run_time = Some(Utc::now());
                    s.last_error = None;
                }
                Err(e) => s.last_error = Some(e.to_string()),
            }
        });
        ok
    }

    /// Loop until stopped. Returns the final status.
    pub async fn run(mut self) -> SchedulerStatus {
        self.control.update(|s| s.start_time = Some(Utc::now()));
        tracing::info!(
            workflow = self.workflow.name(),
            interval_seconds = self.control.interval().as_secs(),
            "scheduler started"
        );

        while self.control.is_running() {
            if self.control.is_paused() {
                self.control.nap(SLICE).await;
                continue;
            }

            self.step().await;
            if !self.control.is_running() {
                break;
            }
            self.wait_for_next_step().await;
        }

        self.workflow.finish();
        let workflow_status = self.workflow.status();
        self.control.update(|s| {
            s.next_run_time = None;
            s.workflow_status = workflow_status;
        });
        tracing::info!(steps = self.step_count, "scheduler stopped");
        self.control.status()
    }

    /// Wait out the interval, measured from now, in slices. Returns early on
    /// stop or pause; an interval change takes effect immediately.
    async fn wait_for_next_step(&self) {
        let started = Instant::now();
        let mut interval = self.control.interval();
        self.set_next_run(interval);

        while self.control.is_running() && !self.control.is_paused() {
            let current = self.control.interval();
            if current != interval {
                interval = current;
                self.set_next_run(interval.saturating_sub(started.elapsed()));
            }
            let elapsed = started.elapsed();
            if elapsed >= interval {
                break;
            }
            self.control.nap(interval - elapsed).await;
        }
    }

    fn set_next_run(&self, remaining: Duration) {
        let next = chrono::Duration::from_std(remaining)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));
        self.control.update(|s| s.next_run_time = next);
    }
}

/// Stop on SIGINT or SIGTERM; pause on SIGUSR1 and resume on SIGUSR2.
pub fn spawn_signal_handler(control: SchedulerControl) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;

    Ok(tokio::spawn(async move {
        while control.is_running() {
            tokio::select! {
                _ = interrupt.recv() => {
                    tracing::info!("received SIGINT");
                    control.stop();
                }
                _ = terminate.recv() => {
                    tracing::info!("received SIGTERM");
                    control.stop();
                }
                _ = usr1.recv() => {
                    control.pause();
                }
                _ = usr2.recv() => {
                    control.resume();
                }
            }
        }
    }))
}
