use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jobdag::engine::Failure;
use jobdag::errors::Result;
use jobdag::{JobError, Orchestrator};
use tokio_util::sync::CancellationToken;

/// What the fake reports when asked to orchestrate.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    TimeOut(Duration),
    Raise(JobError),
}

/// An orchestrator that:
/// - returns a scripted outcome instead of running anything
/// - counts `orchestrate` and `shut_down` calls.
pub struct FakeOrchestrator {
    script: Script,
    failure: Mutex<Option<Failure>>,
    runs: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl FakeOrchestrator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            failure: Mutex::new(None),
            runs: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn orchestrate(&self, _cancel: CancellationToken) -> Result<bool> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let failure = match &self.script {
            Script::Succeed => None,
            Script::TimeOut(timeout) => Some(Failure::TimedOut(*timeout)),
            Script::Raise(err) => Some(Failure::Critical(err.clone())),
        };
        let ok = failure.is_none();
        *self.failure.lock().unwrap() = failure;
        Ok(ok)
    }

    async fn shut_down(&self) -> bool {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn failure(&self) -> Option<Failure> {
        self.failure.lock().unwrap().clone()
    }

    fn describe(&self) -> String {
        "FakeOrchestrator".to_string()
    }
}
