// src/job/requirement.rs

//! Anything a job can be told to require.
//!
//! `requires` accepts a single job, `None`, a list, a nested list, or a
//! [`crate::Sequence`]. All of those are funnelled through [`Requirement`]
//! and flattened into a plain list of jobs before they touch the graph.

use std::collections::HashSet;

use super::{Job, JobId};

#[derive(Debug, Clone, Default)]
pub enum Requirement {
    #[default]
    Empty,
    Job(Job),
    /// The jobs of a sequence, first to last.
    Sequence(Vec<Job>),
    Many(Vec<Requirement>),
}

impl Requirement {
    /// Flatten for use as a requirement: a sequence stands for its last job.
    pub fn required_jobs(self) -> Vec<Job> {
        let mut out = Vec::new();
        self.collect(false, &mut out, &mut HashSet::new());
        out
    }

    /// Flatten for membership: a sequence stands for all of its jobs.
    pub fn member_jobs(self) -> Vec<Job> {
        let mut out = Vec::new();
        self.collect(true, &mut out, &mut HashSet::new());
        out
    }

    fn collect(self, whole_sequences: bool, out: &mut Vec<Job>, seen: &mut HashSet<JobId>) {
        match self {
            Requirement::Empty => {}
            Requirement::Job(job) => push_unseen(job, out, seen),
            Requirement::Sequence(jobs) => {
                if whole_sequences {
                    for job in jobs {
                        push_unseen(job, out, seen);
                    }
                } else if let Some(last) = jobs.into_iter().last() {
                    push_unseen(last, out, seen);
                }
            }
            Requirement::Many(items) => {
                for item in items {
                    item.collect(whole_sequences, out, seen);
                }
            }
        }
    }
}

fn push_unseen(job: Job, out: &mut Vec<Job>, seen: &mut HashSet<JobId>) {
    if seen.insert(job.id()) {
        out.push(job);
    }
}

impl From<Job> for Requirement {
    fn from(job: Job) -> Self {
        Requirement::Job(job)
    }
}

impl From<&Job> for Requirement {
    fn from(job: &Job) -> Self {
        Requirement::Job(job.clone())
    }
}

impl<T: Into<Requirement>> From<Option<T>> for Requirement {
    fn from(item: Option<T>) -> Self {
        item.map_or(Requirement::Empty, Into::into)
    }
}

impl<T: Into<Requirement>> From<Vec<T>> for Requirement {
    fn from(items: Vec<T>) -> Self {
        Requirement::Many(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Requirement>, const N: usize> From<[T; N]> for Requirement {
    fn from(items: [T; N]) -> Self {
        Requirement::Many(items.into_iter().map(Into::into).collect())
    }
}
