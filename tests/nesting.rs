// tests/nesting.rs
mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jobdag::{Failure, Job, JobError, JobValue, JobdagError, Scheduler, SchedulerJob, Sequence};

use crate::common::fake_orchestrator::{FakeOrchestrator, Script};
use crate::common::probes::{ForeverJob, Timeline};
use crate::common::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn nested_scheduler_runs_as_one_job() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let b = timeline.job("b", 30);
    let c = timeline.job("c", 30);
    Sequence::new([&b, &c]);
    let inner = Scheduler::from_jobs([&b, &c]).label("inner");

    let a = timeline.job("a", 30);
    let wrapper = inner.into_job().requires(&a).build();
    let d = timeline.job("d", 10);
    d.requires(&wrapper);
    let outer = Scheduler::from_jobs([&a, &wrapper, &d]);

    assert!(with_timeout(outer.run()).await?);

    assert_eq!(wrapper.label(), "inner");
    assert_eq!(wrapper.result()?, JobValue::Bool(true));
    assert!(b.is_done() && c.is_done());
    assert_eq!(timeline.start_order(), ["a", "b", "c", "d"]);
    assert!(timeline.finished("c") <= timeline.started("d"));
    Ok(())
}

#[tokio::test]
async fn critical_nested_error_is_reraised_unchanged() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let bad = timeline.failing("bad", 10, "inner failure").build();
    let inner = Scheduler::from_jobs(&bad).label("inner");
    let wrapper = inner.into_job().build();
    let outer = Scheduler::from_jobs(&wrapper);

    assert!(!with_timeout(outer.run()).await?);

    let original = bad.raised_exception().expect("inner job raised");
    let reraised = wrapper.raised_exception().expect("wrapper raised");
    assert!(reraised.ptr_eq(&original));
    match outer.failure() {
        Some(Failure::Critical(err)) => assert!(err.ptr_eq(&original)),
        other => panic!("unexpected failure {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn nested_timeout_surfaces_as_timed_out_error() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let slow = timeline.job("slow", 2_000);
    let inner = Scheduler::from_jobs(&slow)
        .label("inner")
        .timeout(Duration::from_millis(100));
    let wrapper = inner.into_job().build();
    let outer = Scheduler::from_jobs(&wrapper);

    assert!(!with_timeout(outer.run()).await?);

    assert!(outer.failed_critical());
    let err = wrapper.raised_exception().expect("wrapper raised");
    let cause = err.downcast_ref::<JobdagError>().expect("a JobdagError");
    assert!(matches!(cause, JobdagError::TimedOut(t) if *t == Duration::from_millis(100)));
    assert!(!slow.is_done());
    Ok(())
}

#[tokio::test]
async fn non_critical_nested_failure_returns_false() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let bad = timeline.failing("bad", 10, "ignored").build();
    let inner = Scheduler::from_jobs(&bad).label("inner");
    let wrapper = inner.into_job().critical(false).build();
    let after = timeline.job("after", 10);
    after.requires(&wrapper);
    let outer = Scheduler::from_jobs([&wrapper, &after]);

    assert!(with_timeout(outer.run()).await?);

    assert_eq!(wrapper.result()?, JobValue::Bool(false));
    assert!(after.is_done());
    Ok(())
}

#[tokio::test]
async fn nested_window_applies_to_its_own_jobs_only() -> TestResult {
    init_tracing();
    let inner_line = Timeline::new();
    let inner_jobs: Vec<Job> = (0..3).map(|i| inner_line.job(&format!("i{i}"), 60)).collect();
    let inner = Scheduler::from_jobs(inner_jobs).jobs_window(1);

    let outer_line = Timeline::new();
    let siblings: Vec<Job> = (0..3).map(|i| outer_line.job(&format!("o{i}"), 60)).collect();
    let mut outer = Scheduler::from_jobs(siblings).jobs_window(4);
    outer.add(inner.into_job().build());

    assert!(with_timeout(outer.run()).await?);

    assert_eq!(inner_line.peak_concurrency(), 1);
    assert_eq!(outer_line.peak_concurrency(), 3);
    Ok(())
}

#[tokio::test]
async fn shutdown_reaches_nested_jobs() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let inner = Scheduler::from_jobs([timeline.job("deep1", 5), timeline.job("deep2", 5)]);
    let outer = Scheduler::from_jobs([inner.into_job().build(), timeline.job("top", 5)]);

    assert!(with_timeout(outer.run()).await?);

    let mut shut = timeline.shutdowns();
    shut.sort();
    assert_eq!(shut, ["deep1", "deep2", "top"]);
    Ok(())
}

#[tokio::test]
async fn any_orchestrator_can_be_nested() -> TestResult {
    init_tracing();
    let err = JobError::new(anyhow::anyhow!("scripted"));
    let fake = Arc::new(FakeOrchestrator::new(Script::Raise(err.clone())));
    let wrapper = Job::builder(SchedulerJob::new(Arc::clone(&fake)))
        .label("fake")
        .build();
    let outer = Scheduler::from_jobs(&wrapper);

    assert!(!with_timeout(outer.run()).await?);

    assert_eq!(fake.runs(), 1);
    assert_eq!(fake.shutdowns(), 1);
    assert!(wrapper.nested().is_none());
    let raised = wrapper.raised_exception().expect("wrapper raised");
    assert!(raised.ptr_eq(&err));
    Ok(())
}

#[tokio::test]
async fn scripted_timeout_is_tolerated_when_not_critical() -> TestResult {
    init_tracing();
    let fake = Arc::new(FakeOrchestrator::new(Script::TimeOut(Duration::from_secs(3))));
    let wrapper = Job::builder(SchedulerJob::new(Arc::clone(&fake)))
        .critical(false)
        .build();
    let outer = Scheduler::from_jobs(&wrapper);

    assert!(with_timeout(outer.run()).await?);
    assert_eq!(wrapper.result()?, JobValue::Bool(false));
    assert_eq!(wrapper.label(), "FakeOrchestrator");
    Ok(())
}

/// A nested scheduler that is still busy when its parent gives up.
struct BusyInner {
    wrapper: Job,
    spinner: Job,
    sleeper: Job,
    ticks: Arc<AtomicUsize>,
}

impl BusyInner {
    /// `spinner` loops until dropped, `sleeper` sleeps for 30s.
    fn new(timeline: &Timeline, forever: bool) -> Self {
        let body = ForeverJob::default();
        let ticks = Arc::clone(&body.ticks);
        let spinner = Job::builder(body).label("spinner").build();
        let sleeper = timeline.job("sleeper", 30_000);
        let wrapper = Scheduler::from_jobs([&spinner, &sleeper])
            .label("busy")
            .into_job()
            .forever(forever)
            .build();
        Self {
            wrapper,
            spinner,
            sleeper,
            ticks,
        }
    }

    /// Everything inside was stopped and shut down before the parent returned.
    async fn assert_wound_down(&self, timeline: &Timeline) {
        assert!(self.wrapper.is_cancelled(), "{:?}", self.wrapper.status());
        assert!(self.spinner.is_cancelled(), "{:?}", self.spinner.status());
        assert!(self.sleeper.is_cancelled(), "{:?}", self.sleeper.status());
        assert!(timeline.finished("sleeper").is_some());
        let shut: Vec<String> = timeline
            .shutdowns()
            .into_iter()
            .filter(|label| label == "sleeper")
            .collect();
        assert_eq!(shut.len(), 1);

        let ticks = self.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(self.ticks.load(Ordering::SeqCst), ticks, "spinner still ticking");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn critical_sibling_stops_a_busy_nested_scheduler() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let busy = BusyInner::new(&timeline, false);
    let boom = timeline.failing("boom", 20, "sibling broke").build();
    let outer = Scheduler::from_jobs([&boom, &busy.wrapper]);

    assert!(!with_timeout(outer.run()).await?);

    assert!(outer.failed_critical());
    busy.assert_wound_down(&timeline).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn parent_timeout_stops_a_busy_nested_scheduler() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let busy = BusyInner::new(&timeline, false);
    let outer = Scheduler::from_jobs(&busy.wrapper).timeout(Duration::from_millis(80));

    assert!(!with_timeout(outer.run()).await?);

    assert!(outer.failed_time_out());
    busy.assert_wound_down(&timeline).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn forever_cleanup_stops_a_busy_nested_scheduler() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let busy = BusyInner::new(&timeline, true);
    let finite = timeline.job("finite", 30);
    let outer = Scheduler::from_jobs([&finite, &busy.wrapper]);

    assert!(with_timeout(outer.run()).await?);

    assert!(finite.is_done());
    busy.assert_wound_down(&timeline).await;
    Ok(())
}
