// src/engine/run_table.rs

//! Per-run bookkeeping: which jobs are in flight, and how many finite jobs
//! have completed.
//!
//! Job bodies run as tasks of a [`JoinSet`]; the table maps each task id
//! back to its job so completions (including panics) can be attributed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dag::Window;
use crate::job::{Job, JobError};

/// What waiting for the next completions produced.
#[derive(Debug)]
pub(crate) enum Wait {
    /// One or more jobs finished; all of them are in the batch.
    Finished(Vec<Job>),
    /// The global timeout expired first.
    TimedOut,
    /// The caller's cancellation token fired.
    Cancelled,
    /// Nothing was in flight.
    Idle,
}

pub(crate) struct RunTable {
    tasks: JoinSet<()>,
    in_flight: HashMap<task::Id, Job>,
    finite_total: usize,
    forever_total: usize,
    finite_done: usize,
}

impl RunTable {
    pub(crate) fn new(jobs: &[Job]) -> Self {
        let forever_total = jobs.iter().filter(|j| j.is_forever()).count();
        Self {
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            finite_total: jobs.len() - forever_total,
            forever_total,
            finite_done: 0,
        }
    }

    /// Hand `job` to the window; it is `Scheduled` until a slot frees up.
    pub(crate) fn admit(&mut self, job: Job, window: &Window, cancel: &CancellationToken) {
        job.mark_scheduled();
        let window = window.clone();
        let cancel = cancel.clone();
        let task_job = job.clone();
        let handle = self
            .tasks
            .spawn(async move { window.admit(task_job, cancel).await });
        self.in_flight.insert(handle.id(), job);
    }

    pub(crate) fn pending(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn pending_jobs(&self) -> impl Iterator<Item = &Job> {
        self.in_flight.values()
    }

    pub(crate) fn forever_total(&self) -> usize {
        self.forever_total
    }

    pub(crate) fn record_finished(&mut self, batch: &[Job]) {
        self.finite_done += batch.iter().filter(|j| !j.is_forever()).count();
    }

    pub(crate) fn all_finite_done(&self) -> bool {
        self.finite_done == self.finite_total
    }

    pub(crate) fn unfinished(&self) -> usize {
        self.finite_total - self.finite_done
    }

    /// Wait for at least one completion, then sweep up any others that are
    /// already available.
    pub(crate) async fn next_batch(
        &mut self,
        remaining: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Wait {
        if self.tasks.is_empty() {
            return Wait::Idle;
        }

        let first = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Wait::Cancelled,
            joined = wait_first(&mut self.tasks, remaining) => joined,
        };
        let first = match first {
            Some(Some(joined)) => joined,
            Some(None) => return Wait::Idle,
            None => return Wait::TimedOut,
        };

        let mut batch = Vec::new();
        batch.extend(self.resolve(first));
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            batch.extend(self.resolve(joined));
        }
        Wait::Finished(batch)
    }

    /// Cancel every in-flight job and wait for their tasks to wind down.
    pub(crate) async fn abort_pending(&mut self, cancel: &CancellationToken) -> usize {
        let count = self.tasks.len();
        cancel.cancel();
        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.resolve(joined);
        }
        count
    }

    fn resolve(&mut self, joined: Result<(task::Id, ()), JoinError>) -> Option<Job> {
        match joined {
            Ok((id, ())) => self.in_flight.remove(&id),
            Err(err) => {
                let job = self.in_flight.remove(&err.id())?;
                if err.is_panic() {
                    let message = panic_message(err);
                    warn!(job = %job.label(), panic = %message, "job panicked");
                    job.mark_done(Err(JobError::panicked(&message)));
                } else {
                    debug!(job = %job.label(), "job task aborted");
                    job.mark_cancelled();
                }
                Some(job)
            }
        }
    }
}

/// `None` on timeout, `Some(None)` when the set is empty.
async fn wait_first(
    tasks: &mut JoinSet<()>,
    remaining: Option<Duration>,
) -> Option<Option<Result<(task::Id, ()), JoinError>>> {
    match remaining {
        Some(remaining) => tokio::time::timeout(remaining, tasks.join_next_with_id())
            .await
            .ok(),
        None => Some(tasks.join_next_with_id().await),
    }
}

fn panic_message(err: JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
