// src/job/status.rs

use super::value::{JobError, JobValue};

/// Lifecycle of a job within one run.
///
/// `Idle -> Scheduled -> Running -> Done` is the normal path. A job whose
/// run gets cancelled while it is blocked on the window stays `Scheduled`;
/// a job cancelled mid-body ends up `Cancelled`.
#[derive(Debug, Clone, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Scheduled,
    Running,
    Done(Result<JobValue, JobError>),
    Cancelled,
}

impl JobStatus {
    /// Handed to the engine (possibly still waiting for a window slot).
    pub fn is_scheduled(&self) -> bool {
        !matches!(self, JobStatus::Idle)
    }

    /// Admitted through the window; stays true once the job is done.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Done(_) | JobStatus::Cancelled
        )
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Done(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobStatus::Cancelled)
    }

    pub fn raised(&self) -> Option<&JobError> {
        match self {
            JobStatus::Done(Err(err)) => Some(err),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&JobValue> {
        match self {
            JobStatus::Done(Ok(value)) => Some(value),
            _ => None,
        }
    }
}
