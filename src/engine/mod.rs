// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`scheduler`] owns the jobs and drives a run: admission through the
//!   window, completion handling, timeout, critical abort and shutdown.
//! - [`run_table`] is the per-run table of in-flight tasks.
//! - [`nested`] lets a scheduler run as a job of another one.
//! - [`surgery`] holds graph edits and checks (sanitize, bypass, keep-only).
//! - [`report`] renders stats, listings and debriefs.

pub mod nested;
pub mod report;
mod run_table;
pub mod scheduler;
pub mod surgery;

pub use nested::{Orchestrator, SchedulerJob};
pub use report::BadgeStyle;
pub use scheduler::{DEFAULT_SHUTDOWN_TIMEOUT, Failure, Scheduler, SchedulerOptions};
