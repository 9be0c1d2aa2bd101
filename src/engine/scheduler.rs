// src/engine/scheduler.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::{Window, graph};
use crate::errors::{JobdagError, Result};
use crate::job::{Job, JobError, JobId, Requirement, lock};

use super::run_table::{RunTable, Wait};

/// Default bound on how long `shutdown` waits for job hooks.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables of one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Max jobs running at once; `None` or `Some(0)` means unbounded.
    pub jobs_window: Option<usize>,
    /// Budget for a whole run.
    pub timeout: Option<Duration>,
    /// Budget for the shutdown hooks; `None` waits forever.
    pub shutdown_timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            jobs_window: None,
            timeout: None,
            shutdown_timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
        }
    }
}

/// Why the last run returned `false`.
#[derive(Debug, Clone)]
pub enum Failure {
    TimedOut(Duration),
    /// The first critical error seen in the completion batch.
    Critical(JobError),
}

#[derive(Debug, Default)]
struct RunState {
    failure: Option<Failure>,
    did_shutdown: bool,
}

/// A set of jobs plus the options to run them with.
///
/// Runs are driven by [`Scheduler::run`]. A scheduler is reusable: every run
/// resets job statuses, the recorded failure and the shutdown guard.
pub struct Scheduler {
    pub(crate) jobs: Vec<Job>,
    options: SchedulerOptions,
    label: Option<String>,
    state: Mutex<RunState>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default())
    }

    pub fn with_options(options: SchedulerOptions) -> Self {
        Self {
            jobs: Vec::new(),
            options,
            label: None,
            state: Mutex::new(RunState::default()),
        }
    }

    /// Build a scheduler holding `jobs`; sequences contribute all their jobs.
    pub fn from_jobs(jobs: impl Into<Requirement>) -> Self {
        let mut scheduler = Self::new();
        scheduler.update(jobs);
        scheduler
    }

    pub fn jobs_window(mut self, jobs_window: usize) -> Self {
        self.options.jobs_window = Some(jobs_window);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    pub fn shutdown_timeout(mut self, shutdown_timeout: Option<Duration>) -> Self {
        self.options.shutdown_timeout = shutdown_timeout;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    pub fn text_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| "Scheduler".to_string())
    }

    // collection API

    pub fn add(&mut self, job: Job) -> &mut Self {
        if !self.jobs.contains(&job) {
            self.jobs.push(job);
        }
        self
    }

    pub fn update(&mut self, jobs: impl Into<Requirement>) -> &mut Self {
        for job in jobs.into().member_jobs() {
            self.add(job);
        }
        self
    }

    pub fn remove(&mut self, job: &Job) -> Result<&mut Self> {
        let Some(pos) = self.jobs.iter().position(|j| j == job) else {
            return Err(JobdagError::JobNotFound(job.label()));
        };
        self.jobs.remove(pos);
        Ok(self)
    }

    pub fn contains(&self, job: &Job) -> bool {
        self.jobs.contains(job)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    // failure reporting

    pub fn failure(&self) -> Option<Failure> {
        lock(&self.state).failure.clone()
    }

    pub fn failed_time_out(&self) -> bool {
        matches!(lock(&self.state).failure, Some(Failure::TimedOut(_)))
    }

    pub fn failed_critical(&self) -> bool {
        matches!(lock(&self.state).failure, Some(Failure::Critical(_)))
    }

    /// One-line reason for the outcome of the last run.
    pub fn why(&self) -> String {
        match &lock(&self.state).failure {
            Some(Failure::TimedOut(timeout)) => {
                format!("TIMED OUT after {}s", timeout.as_secs_f64())
            }
            Some(Failure::Critical(_)) => "a CRITICAL job has raised an exception".to_string(),
            None => "FINE".to_string(),
        }
    }

    fn record_failure(&self, failure: Failure) {
        lock(&self.state).failure = Some(failure);
    }

    // running

    /// Run all jobs until the finite ones are done.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` on a global timeout or
    /// when a critical job raised; [`Scheduler::failure`] tells which. Jobs'
    /// shutdown hooks run before returning in every case.
    pub async fn run(&self) -> Result<bool> {
        self.run_until_cancelled(CancellationToken::new()).await
    }

    /// Like [`Scheduler::run`], aborting with [`JobdagError::Cancelled`]
    /// when `cancel` fires. In-flight jobs observe a child of `cancel`.
    pub async fn run_until_cancelled(&self, cancel: CancellationToken) -> Result<bool> {
        *lock(&self.state) = RunState::default();

        let ids = self.sched_ids()?;
        if self.jobs.is_empty() {
            return Ok(true);
        }
        for job in &self.jobs {
            job.reset();
        }

        let entries = graph::entry_jobs(&self.jobs);
        if entries.is_empty() {
            return Err(JobdagError::NoEntryJobs);
        }
        if let Some((job, requirement)) = graph::dangling_requirements(&self.jobs).into_iter().next()
        {
            return Err(JobdagError::DanglingRequirement {
                job: job.label(),
                requirement: requirement.label(),
            });
        }

        let started = Instant::now();
        let expiration = self.options.timeout.map(|t| started + t);
        let successors = graph::successors_map(&self.jobs);
        let window = Window::new(self.options.jobs_window);
        let run_cancel = cancel.child_token();
        let mut table = RunTable::new(&self.jobs);

        info!(
            scheduler = %self.text_label(),
            jobs = self.jobs.len(),
            window = ?window.capacity(),
            timeout = ?self.options.timeout,
            "starting run"
        );

        for job in entries {
            debug!(id = %id_of(&ids, &job), job = %job.label(), "STARTING");
            table.admit(job, &window, &run_cancel);
        }

        loop {
            let remaining = expiration.map(|e| e.saturating_duration_since(Instant::now()));
            let batch = match table.next_batch(remaining, &cancel).await {
                Wait::Finished(batch) => batch,
                Wait::TimedOut => {
                    let timeout = self.options.timeout.unwrap_or_default();
                    warn!(scheduler = %self.text_label(), ?timeout, "run timed out");
                    let aborted = table.abort_pending(&run_cancel).await;
                    debug!(aborted, "aborted in-flight jobs");
                    self.shutdown().await;
                    self.record_failure(Failure::TimedOut(timeout));
                    return Ok(false);
                }
                Wait::Cancelled => {
                    info!(scheduler = %self.text_label(), "run cancelled");
                    table.abort_pending(&run_cancel).await;
                    self.shutdown().await;
                    return Err(JobdagError::Cancelled);
                }
                Wait::Idle => {
                    let unfinished = table.unfinished();
                    error!(scheduler = %self.text_label(), unfinished, "nothing left in flight");
                    self.shutdown().await;
                    return Err(JobdagError::Stalled { unfinished });
                }
            };

            let mut critical: Option<JobError> = None;
            for job in &batch {
                match job.raised_exception() {
                    Some(err) => {
                        warn!(
                            id = %id_of(&ids, job),
                            job = %job.label(),
                            critical = job.is_critical(),
                            error = %err,
                            "RAISED EXC."
                        );
                        if job.is_critical() && critical.is_none() {
                            critical = Some(err);
                        }
                    }
                    None => debug!(id = %id_of(&ids, job), job = %job.label(), "DONE"),
                }
            }
            if let Some(err) = critical {
                error!(scheduler = %self.text_label(), "emergency exit upon exception in critical job");
                table.abort_pending(&run_cancel).await;
                self.shutdown().await;
                self.record_failure(Failure::Critical(err));
                return Ok(false);
            }

            table.record_finished(&batch);
            if table.all_finite_done() {
                let stray = table.pending_jobs().filter(|j| !j.is_forever()).count();
                if stray > 0 {
                    warn!(
                        forever = table.forever_total(),
                        pending = table.pending(),
                        "apparent mismatch between forever jobs and pending tasks"
                    );
                }
                debug!(pending = table.pending(), "TIDYING forever jobs");
                table.abort_pending(&run_cancel).await;
                self.shutdown().await;
                info!(
                    scheduler = %self.text_label(),
                    elapsed = ?started.elapsed(),
                    "run complete"
                );
                return Ok(true);
            }

            let mut seen = HashSet::new();
            for done in &batch {
                let Some(next) = successors.get(&done.id()) else {
                    continue;
                };
                for candidate in next {
                    if !seen.insert(candidate.id()) || !candidate.is_idle() {
                        continue;
                    }
                    if candidate.required().iter().all(Job::is_done) {
                        debug!(id = %id_of(&ids, candidate), job = %candidate.label(), "STARTING");
                        table.admit(candidate.clone(), &window, &run_cancel);
                    }
                }
            }
        }
    }

    /// Invoke every job's shutdown hook concurrently, bounded by
    /// `shutdown_timeout`.
    ///
    /// Returns false when some hooks were still running at the deadline;
    /// those are aborted. Hook errors and panics are logged only. Calling
    /// this again before the next run is a no-op returning true.
    pub async fn shutdown(&self) -> bool {
        {
            let mut state = lock(&self.state);
            if state.did_shutdown {
                return true;
            }
            state.did_shutdown = true;
        }
        if self.jobs.is_empty() {
            return true;
        }

        debug!(scheduler = %self.text_label(), "scheduler is shutting down...");
        let mut hooks = JoinSet::new();
        for job in &self.jobs {
            let job = job.clone();
            hooks.spawn(async move {
                if let Err(err) = job.runnable().shutdown().await {
                    warn!(job = %job.label(), error = %err, "shutdown hook failed");
                }
            });
        }

        let finished = match self.options.shutdown_timeout {
            Some(limit) => tokio::time::timeout(limit, drain_hooks(&mut hooks))
                .await
                .is_ok(),
            None => {
                drain_hooks(&mut hooks).await;
                true
            }
        };
        if finished {
            return true;
        }

        warn!(
            scheduler = %self.text_label(),
            pending = hooks.len(),
            total = self.jobs.len(),
            "shutdown hooks have not returned within timeout"
        );
        hooks.abort_all();
        while hooks.join_next().await.is_some() {}
        false
    }

    /// Zero-padded ids in topological order, numbering nested schedulers'
    /// jobs right after the job that wraps them.
    pub(crate) fn sched_ids(&self) -> Result<HashMap<JobId, String>> {
        let total = self.total_length();
        let width = total.saturating_sub(1).max(1).to_string().len();
        let mut ids = HashMap::new();
        self.number_jobs(1, width, &mut ids)?;
        Ok(ids)
    }

    fn number_jobs(
        &self,
        start: usize,
        width: usize,
        ids: &mut HashMap<JobId, String>,
    ) -> Result<usize> {
        let mut next = start;
        for job in graph::topological_order(&self.jobs)? {
            ids.insert(job.id(), format!("{next:0width$}"));
            next += 1;
            if let Some(inner) = job.nested() {
                next = inner.number_jobs(next, width, ids)?;
            }
        }
        Ok(next)
    }

    /// Number of jobs, counting nested schedulers' jobs too.
    pub(crate) fn total_length(&self) -> usize {
        self.jobs
            .iter()
            .map(|job| 1 + job.nested().map_or(0, Scheduler::total_length))
            .sum()
    }
}

async fn drain_hooks(hooks: &mut JoinSet<()>) {
    while let Some(joined) = hooks.join_next().await {
        if let Err(err) = joined {
            if err.is_panic() {
                warn!(error = %err, "shutdown hook panicked");
            }
        }
    }
}

pub(crate) fn id_of<'a>(ids: &'a HashMap<JobId, String>, job: &Job) -> &'a str {
    ids.get(&job.id()).map_or("??", String::as_str)
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("label", &self.label)
            .field("jobs", &self.jobs.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
