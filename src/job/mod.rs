// src/job/mod.rs

//! Jobs: the nodes of the dependency graph.
//!
//! A [`Job`] is a cheap, cloneable handle around a user-supplied
//! [`Runnable`] plus the bookkeeping the engine needs: a stable identity,
//! the `critical` / `forever` flags, the list of required jobs, and the
//! status of the current run. Two handles are equal iff they point at the
//! same job, so jobs can be used as map keys and compared in requirement
//! lists.

pub mod builtin;
pub mod requirement;
pub mod status;
pub mod value;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::engine::Scheduler;
use crate::errors::{JobdagError, Result};

pub use requirement::Requirement;
pub use status::JobStatus;
pub use value::{JobError, JobValue};

/// Label used when neither the job nor its body provides one.
pub const NO_LABEL: &str = "NOLABEL";

/// The body of a job.
///
/// `run` is the only required method. `shutdown` is invoked once at the end
/// of every run of the owning scheduler, whether this job ran or not.
#[async_trait]
pub trait Runnable: Send + Sync + 'static {
    async fn run(&self, ctx: JobContext) -> anyhow::Result<JobValue>;

    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fallback label when the job was not given an explicit one.
    fn text_label(&self) -> Option<String> {
        None
    }

    /// Extra line shown by detailed listings.
    fn details(&self) -> Option<String> {
        None
    }

    /// Short type name used in listings.
    fn kind(&self) -> &'static str {
        "Job"
    }

    /// The scheduler wrapped by this body, for nested introspection.
    fn nested(&self) -> Option<&Scheduler> {
        None
    }

    /// Whether the body winds itself down once `ctx.cancel` fires.
    ///
    /// Such bodies are awaited to completion on cancellation instead of
    /// being dropped mid-flight.
    fn winds_down_on_cancel(&self) -> bool {
        false
    }
}

/// Handed to [`Runnable::run`].
#[derive(Debug, Clone)]
pub struct JobContext {
    pub cancel: CancellationToken,
    pub label: String,
    pub critical: bool,
    pub forever: bool,
}

impl JobContext {
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct JobInner {
    id: JobId,
    label: Option<String>,
    critical: bool,
    forever: bool,
    runnable: Box<dyn Runnable>,
    required: Mutex<Vec<Job>>,
    status: Mutex<JobStatus>,
}

#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// A critical, finite job with no label and no requirements.
    pub fn new(runnable: impl Runnable) -> Self {
        Self::builder(runnable).build()
    }

    pub fn builder(runnable: impl Runnable) -> JobBuilder {
        JobBuilder::new(runnable)
    }

    /// Shorthand for a job whose body is an async closure.
    pub fn from_fn<F, Fut>(func: F) -> JobBuilder
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<JobValue>> + Send + 'static,
    {
        JobBuilder::new(builtin::FnJob::new(func))
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    /// Explicit label, else the body's text label, else `NOLABEL`.
    pub fn label(&self) -> String {
        self.inner
            .label
            .clone()
            .or_else(|| self.inner.runnable.text_label())
            .unwrap_or_else(|| NO_LABEL.to_string())
    }

    pub fn is_critical(&self) -> bool {
        self.inner.critical
    }

    pub fn is_forever(&self) -> bool {
        self.inner.forever
    }

    pub fn runnable(&self) -> &dyn Runnable {
        self.inner.runnable.as_ref()
    }

    pub fn nested(&self) -> Option<&Scheduler> {
        self.inner.runnable.nested()
    }

    /// Add requirements. Duplicates and the job itself are ignored.
    pub fn requires(&self, requirement: impl Into<Requirement>) -> &Self {
        let incoming = requirement.into().required_jobs();
        let mut required = lock(&self.inner.required);
        for job in incoming {
            if job == *self || required.contains(&job) {
                continue;
            }
            required.push(job);
        }
        self
    }

    /// Remove requirements; every one of them must currently be present.
    pub fn remove_requires(&self, requirement: impl Into<Requirement>) -> Result<&Self> {
        let outgoing = requirement.into().required_jobs();
        let mut required = lock(&self.inner.required);
        for job in outgoing {
            let Some(pos) = required.iter().position(|r| *r == job) else {
                return Err(JobdagError::RequirementNotFound {
                    job: self.label(),
                    requirement: job.label(),
                });
            };
            required.remove(pos);
        }
        Ok(self)
    }

    /// Snapshot of the required jobs, in insertion order.
    pub fn required(&self) -> Vec<Job> {
        lock(&self.inner.required).clone()
    }

    pub fn requires_job(&self, other: &Job) -> bool {
        lock(&self.inner.required).contains(other)
    }

    /// Keep only the requirements matching `keep`; returns how many were dropped.
    pub(crate) fn retain_required(&self, mut keep: impl FnMut(&Job) -> bool) -> usize {
        let mut required = lock(&self.inner.required);
        let before = required.len();
        required.retain(|job| keep(job));
        before - required.len()
    }

    pub fn status(&self) -> JobStatus {
        lock(&self.inner.status).clone()
    }

    pub fn is_idle(&self) -> bool {
        !self.is_scheduled()
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.inner.status).is_scheduled()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.status).is_running()
    }

    pub fn is_done(&self) -> bool {
        lock(&self.inner.status).is_done()
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.inner.status).is_cancelled()
    }

    pub fn raised_exception(&self) -> Option<JobError> {
        lock(&self.inner.status).raised().cloned()
    }

    /// The value returned by the body.
    ///
    /// Fails when the job is not done yet, or when it raised.
    pub fn result(&self) -> Result<JobValue> {
        match &*lock(&self.inner.status) {
            JobStatus::Done(Ok(value)) => Ok(value.clone()),
            JobStatus::Done(Err(err)) => Err(JobdagError::Raised(err.clone())),
            _ => Err(JobdagError::NotFinished(self.label())),
        }
    }

    pub(crate) fn reset(&self) {
        self.set_status(JobStatus::Idle);
    }

    pub(crate) fn mark_scheduled(&self) {
        self.set_status(JobStatus::Scheduled);
    }

    pub(crate) fn mark_running(&self) {
        self.set_status(JobStatus::Running);
    }

    pub(crate) fn mark_done(&self, outcome: std::result::Result<JobValue, JobError>) {
        self.set_status(JobStatus::Done(outcome));
    }

    pub(crate) fn mark_cancelled(&self) {
        let mut status = lock(&self.inner.status);
        if matches!(*status, JobStatus::Running) {
            *status = JobStatus::Cancelled;
        }
    }

    fn set_status(&self, status: JobStatus) {
        *lock(&self.inner.status) = status;
    }

    pub(crate) fn context(&self, cancel: CancellationToken) -> JobContext {
        JobContext {
            cancel,
            label: self.label(),
            critical: self.is_critical(),
            forever: self.is_forever(),
        }
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("label", &self.label())
            .field("critical", &self.inner.critical)
            .field("forever", &self.inner.forever)
            .finish()
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} `{}`>", self.inner.runnable.kind(), self.label())
    }
}

pub struct JobBuilder {
    runnable: Box<dyn Runnable>,
    label: Option<String>,
    critical: bool,
    forever: bool,
    required: Requirement,
}

impl JobBuilder {
    pub fn new(runnable: impl Runnable) -> Self {
        Self {
            runnable: Box::new(runnable),
            label: None,
            critical: true,
            forever: false,
            required: Requirement::Empty,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn forever(mut self, forever: bool) -> Self {
        self.forever = forever;
        self
    }

    pub fn requires(mut self, requirement: impl Into<Requirement>) -> Self {
        let previous = std::mem::take(&mut self.required);
        self.required = Requirement::Many(vec![previous, requirement.into()]);
        self
    }

    pub fn build(self) -> Job {
        let job = Job {
            inner: Arc::new(JobInner {
                id: JobId::next(),
                label: self.label,
                critical: self.critical,
                forever: self.forever,
                runnable: self.runnable,
                required: Mutex::new(Vec::new()),
                status: Mutex::new(JobStatus::Idle),
            }),
        };
        job.requires(self.required);
        job
    }
}
