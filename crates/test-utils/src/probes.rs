//! Instrumented job bodies.
//!
//! A [`Timeline`] is shared by the probes of one test; it records when each
//! probe started and finished and how many ran at the same time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobdag::{Job, JobBuilder, JobContext, JobValue, Runnable};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Start,
    Finish,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub label: String,
    pub mark: Mark,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct TimelineInner {
    events: Mutex<Vec<Event>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    shutdowns: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    inner: Arc<TimelineInner>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, label: &str, mark: Mark) {
        match mark {
            Mark::Start => {
                let now = self.inner.running.fetch_add(1, Ordering::SeqCst) + 1;
                self.inner.peak.fetch_max(now, Ordering::SeqCst);
            }
            Mark::Finish => {
                self.inner.running.fetch_sub(1, Ordering::SeqCst);
            }
        }
        self.inner.events.lock().unwrap().push(Event {
            label: label.to_string(),
            mark,
            at: Instant::now(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.events.lock().unwrap().clone()
    }

    fn first(&self, label: &str, mark: Mark) -> Option<Instant> {
        self.events()
            .into_iter()
            .find(|e| e.label == label && e.mark == mark)
            .map(|e| e.at)
    }

    pub fn started(&self, label: &str) -> Option<Instant> {
        self.first(label, Mark::Start)
    }

    pub fn finished(&self, label: &str) -> Option<Instant> {
        self.first(label, Mark::Finish)
    }

    /// Labels in the order they started.
    pub fn start_order(&self) -> Vec<String> {
        self.labels(Mark::Start)
    }

    /// Labels in the order they finished.
    pub fn finish_order(&self) -> Vec<String> {
        self.labels(Mark::Finish)
    }

    fn labels(&self, mark: Mark) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.mark == mark)
            .map(|e| e.label)
            .collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    /// Labels whose shutdown hook ran, in call order.
    pub fn shutdowns(&self) -> Vec<String> {
        self.inner.shutdowns.lock().unwrap().clone()
    }

    /// A probe that sleeps for `millis` then returns `Int(millis)`.
    pub fn probe(&self, label: &str, millis: u64) -> ProbeJob {
        ProbeJob {
            label: label.to_string(),
            duration: Duration::from_millis(millis),
            failure: None,
            shutdown_delay: None,
            timeline: self.clone(),
        }
    }

    /// Shorthand for a critical job wrapping [`Timeline::probe`].
    pub fn job(&self, label: &str, millis: u64) -> Job {
        self.probe(label, millis).into_job().build()
    }

    /// A job that sleeps for `millis` then raises `message`.
    pub fn failing(&self, label: &str, millis: u64, message: &str) -> JobBuilder {
        self.probe(label, millis).fail(message).into_job()
    }
}

/// Sleeps, optionally fails, and reports everything to its timeline.
pub struct ProbeJob {
    label: String,
    duration: Duration,
    failure: Option<String>,
    shutdown_delay: Option<Duration>,
    timeline: Timeline,
}

impl ProbeJob {
    pub fn fail(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Make the shutdown hook take this long.
    pub fn slow_shutdown(mut self, delay: Duration) -> Self {
        self.shutdown_delay = Some(delay);
        self
    }

    pub fn into_job(self) -> JobBuilder {
        let label = self.label.clone();
        Job::builder(self).label(label)
    }
}

/// Decrements the running count if the body is dropped mid-sleep.
struct RunningGuard<'a> {
    timeline: &'a Timeline,
    label: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.timeline.record(self.label, Mark::Finish);
    }
}

#[async_trait]
impl Runnable for ProbeJob {
    async fn run(&self, _ctx: JobContext) -> anyhow::Result<JobValue> {
        self.timeline.record(&self.label, Mark::Start);
        let _guard = RunningGuard {
            timeline: &self.timeline,
            label: &self.label,
        };
        tokio::time::sleep(self.duration).await;
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(JobValue::Int(self.duration.as_millis() as i64)),
        }
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        if let Some(delay) = self.shutdown_delay {
            tokio::time::sleep(delay).await;
        }
        self.timeline
            .inner
            .shutdowns
            .lock()
            .unwrap()
            .push(self.label.clone());
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "ProbeJob"
    }
}

/// Never returns on its own; bumps `ticks` every 10ms until dropped.
#[derive(Clone, Default)]
pub struct ForeverJob {
    pub ticks: Arc<AtomicUsize>,
}

#[async_trait]
impl Runnable for ForeverJob {
    async fn run(&self, _ctx: JobContext) -> anyhow::Result<JobValue> {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn kind(&self) -> &'static str {
        "ForeverJob"
    }
}
