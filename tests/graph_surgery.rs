// tests/graph_surgery.rs
mod common;

use std::collections::HashSet;
use std::error::Error;

use jobdag::{Job, JobValue, JobdagError, Requirement, Scheduler, Sequence};

use crate::common::probes::Timeline;
use crate::common::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn noop(label: &str) -> Job {
    Job::from_fn(|_| async { Ok(JobValue::None) }).label(label).build()
}

fn labels(jobs: &[Job]) -> HashSet<String> {
    jobs.iter().map(Job::label).collect()
}

#[test]
fn requirements_flatten_nested_lists_and_skip_nones() {
    let (a, b, c, d) = (noop("a"), noop("b"), noop("c"), noop("d"));
    let seq = Sequence::new([&b, &c]);
    let target = noop("target");

    let nested: Vec<Requirement> = vec![
        Requirement::from(&a),
        Requirement::from(None::<Job>),
        Requirement::from(vec![Some(&a), None, Some(&d)]),
        Requirement::from(&seq),
    ];
    target.requires(nested);

    // a sequence counts through its last job
    assert_eq!(labels(&target.required()), labels(&[a, c, d]));
    assert!(!target.requires_job(&b));
}

#[test]
fn removing_a_missing_requirement_is_an_error() {
    let (a, b) = (noop("a"), noop("b"));
    a.requires(&b);

    a.remove_requires(&b).expect("b was required");
    let err = a.remove_requires(&b).unwrap_err();
    assert!(matches!(err, JobdagError::RequirementNotFound { .. }));
}

#[tokio::test]
async fn sanitize_lets_a_subset_run() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let outside = timeline.job("outside", 5);
    let x = timeline.job("x", 5);
    let y = timeline.job("y", 5);
    x.requires(&outside);
    y.requires(&x);
    let scheduler = Scheduler::from_jobs([&x, &y]);

    // "x" only requires a job outside the set, so nothing can start
    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(err, JobdagError::NoEntryJobs));

    assert_eq!(scheduler.sanitize(), 1);
    assert_eq!(scheduler.sanitize(), 0);
    assert!(with_timeout(scheduler.run()).await?);
    assert!(!outside.is_done());
    assert_eq!(timeline.start_order(), ["x", "y"]);
    Ok(())
}

#[tokio::test]
async fn dangling_requirement_is_reported_at_run_start() {
    init_tracing();
    let (a, b, ghost) = (noop("a"), noop("b"), noop("ghost"));
    b.requires([&a, &ghost]);
    let scheduler = Scheduler::from_jobs([&a, &b]);

    let err = scheduler.run().await.unwrap_err();
    match err {
        JobdagError::DanglingRequirement { job, requirement } => {
            assert_eq!(job, "b");
            assert_eq!(requirement, "ghost");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[tokio::test]
async fn check_cycles_ignores_requirements_outside_the_scheduler() {
    init_tracing();
    let (a, b, ghost) = (noop("a"), noop("b"), noop("ghost"));
    b.requires([&a, &ghost]);
    let scheduler = Scheduler::from_jobs([&a, &b]);

    // acyclic as far as members go, yet not runnable as is
    assert!(scheduler.check_cycles());
    let err = scheduler.run().await.unwrap_err();
    assert!(matches!(err, JobdagError::DanglingRequirement { .. }));

    assert_eq!(scheduler.sanitize(), 1);
    assert!(scheduler.check_cycles());
    assert!(scheduler.run().await.unwrap());
}

#[tokio::test]
async fn bypass_rewires_around_the_removed_job() -> TestResult {
    init_tracing();
    let timeline = Timeline::new();
    let (a, b, c) = (timeline.job("a", 5), timeline.job("b", 5), timeline.job("c", 5));
    let d = timeline.job("d", 5);
    Sequence::new([&a, &b, &c]);
    d.requires(&b);
    let mut scheduler = Scheduler::from_jobs([&a, &b, &c, &d]);

    scheduler.bypass_and_remove(&b)?;

    assert!(!scheduler.contains(&b));
    assert_eq!(labels(&c.required()), labels(std::slice::from_ref(&a)));
    assert_eq!(labels(&d.required()), labels(std::slice::from_ref(&a)));
    assert!(with_timeout(scheduler.run()).await?);
    assert!(!b.is_done());

    let err = scheduler.bypass_and_remove(&b).unwrap_err();
    assert!(matches!(err, JobdagError::JobNotFound(_)));
    Ok(())
}

#[test]
fn keep_only_between_trims_both_ends() {
    // a -> b -> c -> d, plus a side branch b -> e
    let (a, b, c, d, e) = (noop("a"), noop("b"), noop("c"), noop("d"), noop("e"));
    Sequence::new([&a, &b, &c, &d]);
    e.requires(&b);
    let all = [&a, &b, &c, &d, &e];

    let mut inclusive = Scheduler::from_jobs(all);
    inclusive.keep_only_between(&b, &d, true, true);
    assert_eq!(labels(inclusive.jobs()), labels(&[b.clone(), c.clone(), d.clone()]));

    let mut exclusive = Scheduler::from_jobs(all);
    exclusive.keep_only_between(&b, &d, false, false);
    assert_eq!(labels(exclusive.jobs()), labels(std::slice::from_ref(&c)));
    // c's requirement on b was dropped along with b
    assert!(c.required().is_empty());
}

#[test]
fn neighbourhood_queries() {
    let (a, b, c, d) = (noop("a"), noop("b"), noop("c"), noop("d"));
    b.requires(&a);
    c.requires(&a);
    d.requires([&b, &c]);
    let scheduler = Scheduler::from_jobs([&a, &b, &c, &d]);

    assert_eq!(labels(&scheduler.entry_jobs()), labels(std::slice::from_ref(&a)));
    assert_eq!(labels(&scheduler.exit_jobs(true)), labels(std::slice::from_ref(&d)));
    assert_eq!(labels(&scheduler.successors(&a)), labels(&[b.clone(), c.clone()]));
    assert_eq!(labels(&scheduler.predecessors(&d)), labels(&[b.clone(), c.clone()]));
    assert_eq!(scheduler.successors_downstream(&b).len(), 2);
    assert_eq!(scheduler.predecessors_upstream(&d).len(), 4);
}

#[test]
fn cycles_are_detected_in_nested_schedulers_too() {
    let (x, y) = (noop("x"), noop("y"));
    x.requires(&y);
    y.requires(&x);
    let inner = Scheduler::from_jobs([&x, &y]);
    let outer = Scheduler::from_jobs([inner.into_job().build(), noop("top")]);

    assert!(!outer.check_cycles());
    assert!(outer.topological_order().is_ok());
}

#[test]
fn iterate_jobs_descends_into_nested_schedulers() -> TestResult {
    let (inner_a, inner_b) = (noop("inner_a"), noop("inner_b"));
    inner_b.requires(&inner_a);
    let wrapper = Scheduler::from_jobs([&inner_b, &inner_a])
        .label("box")
        .into_job()
        .build();
    let last = noop("last");
    last.requires(&wrapper);
    let outer = Scheduler::from_jobs([&last, &wrapper]);

    let flat: Vec<String> = outer.iterate_jobs(true)?.iter().map(Job::label).collect();
    assert_eq!(flat, ["box", "inner_a", "inner_b", "last"]);

    let shallow = outer.iterate_jobs(false)?;
    assert_eq!(shallow.len(), 2);
    Ok(())
}
