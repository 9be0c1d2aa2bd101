// src/sequence.rs

//! Linear chains of jobs.
//!
//! A [`Sequence`] makes each job require the previous one. It is only a
//! building aid: the scheduler never sees it, just the jobs inside. Used as
//! a requirement it stands for its last job; added to a scheduler it
//! contributes all of its jobs.

use crate::job::{Job, Requirement};

#[derive(Debug, Clone, Default)]
pub struct Sequence {
    jobs: Vec<Job>,
}

impl Sequence {
    /// Chain `items` in order; nested sequences are spliced in.
    pub fn new(items: impl Into<Requirement>) -> Self {
        let mut seq = Self::default();
        seq.append(items);
        seq
    }

    /// Chain `items` and make the first job require `required`.
    pub fn with_required(items: impl Into<Requirement>, required: impl Into<Requirement>) -> Self {
        let seq = Self::new(items);
        seq.requires(required);
        seq
    }

    /// Add jobs at the end; the first new one requires the current last.
    pub fn append(&mut self, items: impl Into<Requirement>) -> &mut Self {
        for job in items.into().member_jobs() {
            if let Some(last) = self.jobs.last() {
                job.requires(last);
            }
            self.jobs.push(job);
        }
        self
    }

    /// Requirements of the sequence land on its first job.
    pub fn requires(&self, required: impl Into<Requirement>) -> &Self {
        if let Some(first) = self.jobs.first() {
            first.requires(required);
        }
        self
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn first(&self) -> Option<&Job> {
        self.jobs.first()
    }

    pub fn last(&self) -> Option<&Job> {
        self.jobs.last()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl From<Sequence> for Requirement {
    fn from(seq: Sequence) -> Self {
        Requirement::Sequence(seq.jobs)
    }
}

impl From<&Sequence> for Requirement {
    fn from(seq: &Sequence) -> Self {
        Requirement::Sequence(seq.jobs.clone())
    }
}
