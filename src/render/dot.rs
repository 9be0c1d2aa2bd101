// src/render/dot.rs

//! Graphviz DOT export.
//!
//! Nodes are named by scheduling id so output does not depend on labels.
//! Nested schedulers become `cluster_<id>` subgraphs; edges into or out of a
//! cluster are anchored on a middle entry/exit job of the cluster and
//! clipped with `lhead` / `ltail`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::engine::Scheduler;
use crate::engine::scheduler::id_of;
use crate::errors::Result;
use crate::job::{Job, JobId, NO_LABEL};

/// Ordered DOT attributes, rendered as `key="value",...`.
#[derive(Debug, Default, Clone)]
pub struct DotStyle(Vec<(&'static str, String)>);

impl DotStyle {
    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.0.push((key, value.into()));
    }

    fn render(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}={}", protect(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn protect(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

/// Box style of a job: rounded unless it wraps a scheduler, dashed when
/// forever, thick red border when critical.
pub fn job_style(job: &Job, id: &str) -> DotStyle {
    let mut style = DotStyle::default();
    let label = job.label();
    if label != NO_LABEL {
        style.set("label", format!("{id}: {label}"));
    }
    style.set("shape", "box");
    let mut look = Vec::new();
    if job.nested().is_none() {
        look.push("rounded");
    }
    if job.is_forever() {
        look.push("dashed");
    }
    style.set("style", look.join(","));
    if job.is_critical() {
        style.set("color", "red");
        style.set("penwidth", "2");
    } else {
        style.set("penwidth", "0.5");
    }
    style
}

impl Scheduler {
    pub fn dot_format(&self) -> Result<String> {
        let ids = self.sched_ids()?;
        Ok(format!("digraph jobdag{}", self.dot_body(&ids, &DotStyle::default())?))
    }

    pub fn export_as_dotfile(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        fs::write(path, self.dot_format()?)?;
        info!(path = %path.display(), "wrote dot file");
        Ok(format!("(Over)wrote {}", path.display()))
    }

    fn dot_body(&self, ids: &HashMap<JobId, String>, style: &DotStyle) -> Result<String> {
        let mut out = String::from("{\ncompound=true;\n");
        out.push_str(&format!("graph [{}];\n", style.render()));

        for job in self.topological_order()? {
            let id = id_of(ids, &job);
            match job.nested() {
                None => {
                    out.push_str(&format!("{id} [{}]\n", job_style(&job, id).render()));
                    for req in job.required() {
                        match req.nested() {
                            None => out.push_str(&format!("{} -> {id};\n", id_of(ids, &req))),
                            Some(upstream) => out.push_str(&format!(
                                "{} -> {id} [ltail=cluster_{}];\n",
                                id_of(ids, &upstream.middle_exit_job()?),
                                id_of(ids, &req)
                            )),
                        }
                    }
                }
                Some(inner) => {
                    out.push_str(&format!("subgraph cluster_{id}"));
                    out.push_str(&inner.dot_body(ids, &job_style(&job, id))?);
                    let head = id_of(ids, &inner.middle_entry_job()?).to_string();
                    for req in job.required() {
                        match req.nested() {
                            None => out.push_str(&format!(
                                "{} -> {head} [lhead=cluster_{id}];\n",
                                id_of(ids, &req)
                            )),
                            Some(upstream) => out.push_str(&format!(
                                "{} -> {head} [lhead=cluster_{id} ltail=cluster_{}];\n",
                                id_of(ids, &upstream.middle_exit_job()?),
                                id_of(ids, &req)
                            )),
                        }
                    }
                }
            }
        }
        out.push_str("}\n");
        Ok(out)
    }

    /// A plain (non-scheduler) entry job from the middle of the entries.
    fn middle_entry_job(&self) -> Result<Job> {
        let entries = self.entry_jobs();
        let candidate = middle(&entries).ok_or_else(|| {
            crate::errors::JobdagError::Other(anyhow::anyhow!(
                "no entry found in '{}'",
                self.text_label()
            ))
        })?;
        match candidate.nested() {
            Some(inner) => inner.middle_entry_job(),
            None => Ok(candidate),
        }
    }

    /// Same as `middle_entry_job` for exits; falls back to forever jobs.
    fn middle_exit_job(&self) -> Result<Job> {
        let mut exits = self.exit_jobs(true);
        if exits.is_empty() {
            exits = self.exit_jobs(false);
        }
        let candidate = middle(&exits).ok_or_else(|| {
            crate::errors::JobdagError::Other(anyhow::anyhow!(
                "no exit found in '{}'",
                self.text_label()
            ))
        })?;
        match candidate.nested() {
            Some(inner) => inner.middle_exit_job(),
            None => Ok(candidate),
        }
    }
}

fn middle(jobs: &[Job]) -> Option<Job> {
    if jobs.is_empty() {
        return None;
    }
    jobs.get((jobs.len() - 1) / 2).cloned()
}
