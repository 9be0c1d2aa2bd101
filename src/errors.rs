// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! These are *structural* errors: a graph that cannot be run, a config file
//! that does not describe a valid pipeline, a requirement that cannot be
//! removed. Errors raised by job bodies are not represented here; they are
//! recorded on the job as a [`crate::job::JobError`].

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobdagError {
    #[error("no entry jobs found - cannot orchestrate")]
    NoEntryJobs,

    #[error("scheduler could not be scanned - most likely because of cycles ({unscanned} job(s) left unscanned)")]
    Cycle { unscanned: usize },

    #[error("job '{job}' does not require '{requirement}'")]
    RequirementNotFound { job: String, requirement: String },

    #[error("job not found in scheduler: {0}")]
    JobNotFound(String),

    #[error("job '{job}' requires '{requirement}', which is not part of the scheduler")]
    DanglingRequirement { job: String, requirement: String },

    #[error("orchestration stalled with {unfinished} unfinished job(s) and nothing in flight")]
    Stalled { unfinished: usize },

    #[error("critical scheduler took too long (timeout {0:?})")]
    TimedOut(Duration),

    #[error("job was cancelled")]
    Cancelled,

    #[error("job '{0}' is not finished")]
    NotFinished(String),

    #[error("job raised an exception: {0}")]
    Raised(crate::job::JobError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobdagError>;
