// src/dag/window.rs

//! Concurrency window: caps how many job bodies run at once.
//!
//! Every job handed to the engine goes through [`Window::admit`], which
//! waits for a slot, runs the body, and records the outcome on the job. A
//! window of `None` or `Some(0)` is unbounded.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::job::{Job, JobError};

#[derive(Debug, Clone)]
pub struct Window {
    capacity: Option<usize>,
    slots: Option<Arc<Semaphore>>,
}

impl Window {
    pub fn new(jobs_window: Option<usize>) -> Self {
        let capacity = jobs_window.filter(|&n| n > 0);
        Self {
            capacity,
            slots: capacity.map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Free slots right now; `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.slots.as_ref().map(|s| s.available_permits())
    }

    /// Wait for a slot, then run `job` to completion.
    ///
    /// If `cancel` fires while waiting, the job is left `Scheduled`; if it
    /// fires while the body runs, the body is dropped and the job is marked
    /// `Cancelled`. Bodies that [wind down on their own] are awaited instead,
    /// and marked `Cancelled` when they fail after the token fired. The slot
    /// is released before returning in every case.
    ///
    /// [wind down on their own]: crate::job::Runnable::winds_down_on_cancel
    pub async fn admit(&self, job: Job, cancel: CancellationToken) {
        let _permit = match &self.slots {
            Some(slots) => {
                let acquired = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(job = %job.label(), "cancelled while waiting for a window slot");
                        return;
                    }
                    permit = Arc::clone(slots).acquire_owned() => permit,
                };
                match acquired {
                    Ok(permit) => Some(permit),
                    Err(err) => {
                        warn!(job = %job.label(), error = %err, "window closed; job not started");
                        return;
                    }
                }
            }
            None => None,
        };

        job.mark_running();
        let ctx = job.context(cancel.clone());
        let runnable = job.runnable();
        let outcome = if runnable.winds_down_on_cancel() {
            match runnable.run(ctx).await {
                Err(err) if cancel.is_cancelled() => {
                    debug!(job = %job.label(), error = %err, "body wound down after cancel");
                    None
                }
                res => Some(res),
            }
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = runnable.run(ctx) => Some(res),
            }
        };

        match outcome {
            Some(res) => job.mark_done(res.map_err(JobError::new)),
            None => {
                debug!(job = %job.label(), "job body cancelled");
                job.mark_cancelled();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, JobValue};
    use std::time::Duration;

    #[test]
    fn zero_means_unbounded() {
        assert_eq!(Window::new(Some(0)).capacity(), None);
        assert_eq!(Window::new(None).available(), None);
        assert_eq!(Window::new(Some(3)).available(), Some(3));
    }

    #[tokio::test]
    async fn admit_records_the_outcome() {
        let ok = Job::from_fn(|_| async { Ok(JobValue::Int(1)) }).build();
        let ko = Job::from_fn(|_| async { anyhow::bail!("nope") }).build();
        let window = Window::new(Some(1));

        window.admit(ok.clone(), CancellationToken::new()).await;
        window.admit(ko.clone(), CancellationToken::new()).await;

        assert_eq!(ok.result().unwrap(), JobValue::Int(1));
        assert_eq!(ko.raised_exception().unwrap().to_string(), "nope");
        assert_eq!(window.available(), Some(1));
    }

    #[tokio::test]
    async fn cancelled_while_blocked_stays_scheduled() {
        let window = Window::new(Some(1));
        let hog = Job::from_fn(|_| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(JobValue::None)
        })
        .build();
        let waiting = Job::from_fn(|_| async { Ok(JobValue::None) }).build();
        waiting.mark_scheduled();

        let cancel = CancellationToken::new();
        let hog_task = tokio::spawn({
            let (w, j, c) = (window.clone(), hog.clone(), cancel.clone());
            async move { w.admit(j, c).await }
        });
        while window.available() != Some(0) {
            tokio::task::yield_now().await;
        }
        let wait_task = tokio::spawn({
            let (w, j, c) = (window.clone(), waiting.clone(), cancel.clone());
            async move { w.admit(j, c).await }
        });
        cancel.cancel();
        hog_task.await.unwrap();
        wait_task.await.unwrap();

        assert!(matches!(hog.status(), JobStatus::Cancelled));
        assert!(matches!(waiting.status(), JobStatus::Scheduled));
        assert_eq!(window.available(), Some(1));
    }

    struct Cooperative {
        wound_down: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl crate::job::Runnable for Cooperative {
        async fn run(&self, ctx: crate::job::JobContext) -> anyhow::Result<JobValue> {
            ctx.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.wound_down
                .store(true, std::sync::atomic::Ordering::SeqCst);
            anyhow::bail!("stopped")
        }

        fn winds_down_on_cancel(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn cooperative_bodies_are_awaited_after_cancel() {
        let wound_down = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let job = Job::builder(Cooperative {
            wound_down: Arc::clone(&wound_down),
        })
        .build();
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let (w, j, c) = (Window::new(Some(1)), job.clone(), cancel.clone());
            async move { w.admit(j, c).await }
        });
        while !job.is_running() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        task.await.unwrap();

        assert!(wound_down.load(std::sync::atomic::Ordering::SeqCst));
        assert!(matches!(job.status(), JobStatus::Cancelled));
    }
}
