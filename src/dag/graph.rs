// src/dag/graph.rs

//! Pure graph queries over a set of jobs.
//!
//! The edges live on the jobs themselves (`job.required()`); successors are
//! derived on demand. Requirements that point outside the given set are
//! ignored by every function here except [`dangling_requirements`].

use std::collections::{HashMap, HashSet};

use crate::errors::{JobdagError, Result};
use crate::job::{Job, JobId};

fn member_ids(jobs: &[Job]) -> HashSet<JobId> {
    jobs.iter().map(Job::id).collect()
}

fn push_unique(out: &mut Vec<Job>, seen: &mut HashSet<JobId>, job: &Job) {
    if seen.insert(job.id()) {
        out.push(job.clone());
    }
}

/// Jobs in an order where each one comes after all of its (in-set)
/// requirements.
///
/// Works by repeated marking passes: a job is marked once all its in-set
/// requirements are marked. Ties follow insertion order. Fails with
/// [`JobdagError::Cycle`] when a pass marks nothing new.
pub fn topological_order(jobs: &[Job]) -> Result<Vec<Job>> {
    let members = member_ids(jobs);
    let mut marked: HashSet<JobId> = HashSet::with_capacity(jobs.len());
    let mut order = Vec::with_capacity(jobs.len());

    while order.len() < jobs.len() {
        let mut progressed = false;
        for job in jobs {
            if marked.contains(&job.id()) {
                continue;
            }
            let ready = job
                .required()
                .iter()
                .filter(|req| members.contains(&req.id()))
                .all(|req| marked.contains(&req.id()));
            if ready {
                marked.insert(job.id());
                order.push(job.clone());
                progressed = true;
            }
        }
        if !progressed {
            return Err(JobdagError::Cycle {
                unscanned: jobs.len() - order.len(),
            });
        }
    }
    Ok(order)
}

/// Reverse edges: for each job, the in-set jobs that require it.
pub fn successors_map(jobs: &[Job]) -> HashMap<JobId, Vec<Job>> {
    let members = member_ids(jobs);
    let mut map: HashMap<JobId, Vec<Job>> = jobs.iter().map(|j| (j.id(), Vec::new())).collect();
    for job in jobs {
        for req in job.required() {
            if members.contains(&req.id()) {
                if let Some(succ) = map.get_mut(&req.id()) {
                    if !succ.contains(job) {
                        succ.push(job.clone());
                    }
                }
            }
        }
    }
    map
}

/// Jobs with no requirements at all.
pub fn entry_jobs(jobs: &[Job]) -> Vec<Job> {
    jobs.iter()
        .filter(|job| job.required().is_empty())
        .cloned()
        .collect()
}

/// Jobs that nothing in the set requires.
pub fn exit_jobs(jobs: &[Job], discard_forever: bool) -> Vec<Job> {
    let succ = successors_map(jobs);
    jobs.iter()
        .filter(|job| !(discard_forever && job.is_forever()))
        .filter(|job| succ.get(&job.id()).is_none_or(Vec::is_empty))
        .cloned()
        .collect()
}

/// In-set jobs that `starts` directly require.
pub fn predecessors(jobs: &[Job], starts: &[Job]) -> Vec<Job> {
    let members = member_ids(jobs);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for start in starts {
        for req in start.required() {
            if members.contains(&req.id()) {
                push_unique(&mut out, &mut seen, &req);
            }
        }
    }
    out
}

/// In-set jobs that directly require one of `starts`.
pub fn successors(jobs: &[Job], starts: &[Job]) -> Vec<Job> {
    let succ = successors_map(jobs);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for start in starts {
        if let Some(next) = succ.get(&start.id()) {
            for job in next {
                push_unique(&mut out, &mut seen, job);
            }
        }
    }
    out
}

/// `starts` plus everything they transitively require.
pub fn predecessors_upstream(jobs: &[Job], starts: &[Job]) -> Vec<Job> {
    closure(starts, |job| predecessors(jobs, std::slice::from_ref(job)))
}

/// `starts` plus everything that transitively requires them.
pub fn successors_downstream(jobs: &[Job], starts: &[Job]) -> Vec<Job> {
    let succ = successors_map(jobs);
    closure(starts, |job| succ.get(&job.id()).cloned().unwrap_or_default())
}

fn closure(starts: &[Job], mut step: impl FnMut(&Job) -> Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut stack: Vec<Job> = starts.to_vec();
    stack.reverse();
    while let Some(job) = stack.pop() {
        if !seen.insert(job.id()) {
            continue;
        }
        let next = step(&job);
        out.push(job);
        stack.extend(next.into_iter().rev());
    }
    out
}

/// `(job, requirement)` pairs where the requirement is not in the set.
pub fn dangling_requirements(jobs: &[Job]) -> Vec<(Job, Job)> {
    let members = member_ids(jobs);
    jobs.iter()
        .flat_map(|job| {
            job.required()
                .into_iter()
                .filter(|req| !members.contains(&req.id()))
                .map(|req| (job.clone(), req))
                .collect::<Vec<_>>()
        })
        .collect()
}
