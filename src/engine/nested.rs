// src/engine/nested.rs

//! Schedulers as jobs.
//!
//! [`SchedulerJob`] wraps anything implementing [`Orchestrator`] (normally a
//! [`Scheduler`]) so it can sit in a parent graph. Its jobs see only its own
//! window and timeout. When a *critical* nested scheduler fails, the parent
//! sees the failure as an error raised by the wrapping job:
//!
//! - a timeout becomes [`JobdagError::TimedOut`];
//! - a critical job error is re-raised as the very same [`JobError`].
//!
//! A non-critical nested scheduler just returns `Bool(false)`.
//!
//! When the parent aborts, the inner run is not dropped: it observes the
//! parent's token, cancels its own jobs, runs their shutdown hooks and only
//! then returns, leaving the wrapping job `Cancelled`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{JobdagError, Result};
use crate::job::{Job, JobBuilder, JobContext, JobValue, Runnable};

use super::scheduler::{Failure, Scheduler};

/// Something that can run a graph of jobs to completion.
#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    async fn orchestrate(&self, cancel: CancellationToken) -> Result<bool>;

    async fn shut_down(&self) -> bool;

    /// Why the last `orchestrate` returned `Ok(false)`.
    fn failure(&self) -> Option<Failure>;

    fn describe(&self) -> String;

    fn as_scheduler(&self) -> Option<&Scheduler> {
        None
    }
}

#[async_trait]
impl Orchestrator for Scheduler {
    async fn orchestrate(&self, cancel: CancellationToken) -> Result<bool> {
        self.run_until_cancelled(cancel).await
    }

    async fn shut_down(&self) -> bool {
        self.shutdown().await
    }

    fn failure(&self) -> Option<Failure> {
        Scheduler::failure(self)
    }

    fn describe(&self) -> String {
        self.text_label()
    }

    fn as_scheduler(&self) -> Option<&Scheduler> {
        Some(self)
    }
}

#[async_trait]
impl<O: Orchestrator> Orchestrator for std::sync::Arc<O> {
    async fn orchestrate(&self, cancel: CancellationToken) -> Result<bool> {
        (**self).orchestrate(cancel).await
    }

    async fn shut_down(&self) -> bool {
        (**self).shut_down().await
    }

    fn failure(&self) -> Option<Failure> {
        (**self).failure()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn as_scheduler(&self) -> Option<&Scheduler> {
        (**self).as_scheduler()
    }
}

pub struct SchedulerJob<O: Orchestrator = Scheduler> {
    inner: O,
}

impl<O: Orchestrator> SchedulerJob<O> {
    pub fn new(inner: O) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: Orchestrator> Runnable for SchedulerJob<O> {
    async fn run(&self, ctx: JobContext) -> anyhow::Result<JobValue> {
        let ok = self.inner.orchestrate(ctx.cancel.clone()).await?;
        if ok || !ctx.critical {
            debug!(job = %ctx.label, ok, "nested scheduler finished");
            return Ok(JobValue::Bool(ok));
        }
        match self.inner.failure() {
            Some(Failure::TimedOut(timeout)) => Err(JobdagError::TimedOut(timeout).into()),
            Some(Failure::Critical(err)) => Err(anyhow::Error::new(err)),
            None => Err(anyhow::anyhow!(
                "nested scheduler '{}' failed without a recorded cause",
                ctx.label
            )),
        }
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        if !self.inner.shut_down().await {
            warn!(scheduler = %self.inner.describe(), "nested shutdown did not complete in time");
        }
        Ok(())
    }

    fn text_label(&self) -> Option<String> {
        Some(self.inner.describe())
    }

    fn kind(&self) -> &'static str {
        "SchedulerJob"
    }

    fn nested(&self) -> Option<&Scheduler> {
        self.inner.as_scheduler()
    }

    // the inner run cancels its own jobs and shuts them down
    fn winds_down_on_cancel(&self) -> bool {
        true
    }
}

impl Scheduler {
    /// Wrap this scheduler as a job of a parent scheduler.
    pub fn into_job(self) -> JobBuilder {
        Job::builder(SchedulerJob::new(self))
    }
}
