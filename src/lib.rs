// ABOUTME: The adloop binary's library half: CLI, configuration, scheduler, and daemon control.
// ABOUTME: Split from main.rs so the integration tests can drive the scheduler and control socket directly.

#[cfg(not(unix))]
compile_error!("adloop needs a Unix-like OS for its control socket and signals");

pub mod cli;
pub mod config;
pub mod control;
pub mod daemon;
pub mod scheduler;

pub use config::{AdloopConfig, ConfigError};
pub use control::{ControlError, ControlRequest, ControlResponse, RuntimeFiles};
pub use scheduler::{Scheduler, SchedulerControl, SchedulerStatus};
