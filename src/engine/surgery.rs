// src/engine/surgery.rs

//! Structural edits and checks on a scheduler's graph.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::dag::graph;
use crate::errors::{JobdagError, Result};
use crate::job::{Job, JobId, Requirement};

use super::scheduler::Scheduler;

impl Scheduler {
    /// Jobs sorted so that each comes after its requirements.
    pub fn topological_order(&self) -> Result<Vec<Job>> {
        graph::topological_order(&self.jobs)
    }

    /// True when this scheduler and every nested one are acyclic.
    ///
    /// Only edges between members are looked at: a requirement on a job
    /// outside the scheduler is neither a cycle nor caught here, though
    /// `run` rejects it with [`JobdagError::DanglingRequirement`]. Use
    /// [`Scheduler::sanitize`] first when that matters.
    pub fn check_cycles(&self) -> bool {
        match graph::topological_order(&self.jobs) {
            Ok(order) => order
                .iter()
                .all(|job| job.nested().is_none_or(Scheduler::check_cycles)),
            Err(err) => {
                debug!(scheduler = %self.text_label(), error = %err, "cycle check failed");
                false
            }
        }
    }

    /// Drop requirements that point outside the scheduler, recursively.
    ///
    /// Returns how many requirements were removed.
    pub fn sanitize(&self) -> usize {
        let members: HashSet<JobId> = self.jobs.iter().map(Job::id).collect();
        let mut removed = 0;
        for job in &self.jobs {
            let dropped = job.retain_required(|req| members.contains(&req.id()));
            if dropped > 0 {
                info!(
                    job = %job.label(),
                    dropped,
                    "sanitize: removed requirement(s) on jobs outside the scheduler"
                );
            }
            removed += dropped;
            if let Some(inner) = job.nested() {
                removed += inner.sanitize();
            }
        }
        removed
    }

    pub fn entry_jobs(&self) -> Vec<Job> {
        graph::entry_jobs(&self.jobs)
    }

    pub fn exit_jobs(&self, discard_forever: bool) -> Vec<Job> {
        graph::exit_jobs(&self.jobs, discard_forever)
    }

    pub fn predecessors(&self, starts: impl Into<Requirement>) -> Vec<Job> {
        graph::predecessors(&self.jobs, &starts.into().member_jobs())
    }

    pub fn successors(&self, starts: impl Into<Requirement>) -> Vec<Job> {
        graph::successors(&self.jobs, &starts.into().member_jobs())
    }

    pub fn predecessors_upstream(&self, starts: impl Into<Requirement>) -> Vec<Job> {
        graph::predecessors_upstream(&self.jobs, &starts.into().member_jobs())
    }

    pub fn successors_downstream(&self, starts: impl Into<Requirement>) -> Vec<Job> {
        graph::successors_downstream(&self.jobs, &starts.into().member_jobs())
    }

    /// Remove `job`, rewiring each of its downstream jobs onto each of its
    /// upstream jobs.
    pub fn bypass_and_remove(&mut self, job: &Job) -> Result<()> {
        if !self.contains(job) {
            return Err(JobdagError::JobNotFound(job.label()));
        }
        let upstreams = job.required();
        for downstream in graph::successors(&self.jobs, std::slice::from_ref(job)) {
            downstream.requires(upstreams.clone());
            downstream.retain_required(|req| req != job);
        }
        self.remove(job)?;
        Ok(())
    }

    /// Keep only `remains`, then drop requirements on removed jobs.
    pub fn keep_only(&mut self, remains: impl Into<Requirement>) {
        let keep: HashSet<JobId> = remains.into().member_jobs().iter().map(Job::id).collect();
        self.jobs.retain(|job| keep.contains(&job.id()));
        self.sanitize();
    }

    /// Keep the jobs lying on a path from `starts` to `ends`.
    ///
    /// `starts` and `ends` themselves are kept unless told otherwise.
    pub fn keep_only_between(
        &mut self,
        starts: impl Into<Requirement>,
        ends: impl Into<Requirement>,
        keep_starts: bool,
        keep_ends: bool,
    ) {
        let starts = starts.into().member_jobs();
        let ends = ends.into().member_jobs();

        let downstream: HashSet<JobId> = graph::successors_downstream(&self.jobs, &starts)
            .iter()
            .map(Job::id)
            .collect();
        let upstream: HashSet<JobId> = graph::predecessors_upstream(&self.jobs, &ends)
            .iter()
            .map(Job::id)
            .collect();

        let mut keep: HashSet<JobId> = downstream.intersection(&upstream).copied().collect();
        if !keep_starts {
            for job in &starts {
                keep.remove(&job.id());
            }
        }
        if !keep_ends {
            for job in &ends {
                keep.remove(&job.id());
            }
        }
        self.jobs.retain(|job| keep.contains(&job.id()));
        self.sanitize();
    }

    /// Depth-first walk in topological order; nested schedulers' jobs
    /// follow the job that wraps them when `scan_nested` is set.
    pub fn iterate_jobs(&self, scan_nested: bool) -> Result<Vec<Job>> {
        let mut out = Vec::new();
        for job in self.topological_order()? {
            let nested = match job.nested() {
                Some(inner) if scan_nested => inner.iterate_jobs(true)?,
                _ => Vec::new(),
            };
            out.push(job);
            out.extend(nested);
        }
        Ok(out)
    }
}
