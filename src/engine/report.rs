// src/engine/report.rs

//! Human-readable views of a scheduler: stats, listings and debriefs.
//!
//! Every job gets a 7-character badge summarising four dimensions:
//!
//! | position | ASCII            | Unicode   | meaning                          |
//! |----------|------------------|-----------|----------------------------------|
//! | 1        | `!`              | `⚠`       | critical                         |
//! | 2        | `:(` / `:)`      | `★` / `☉` | raised / running                 |
//! | 3        | `x` `o` `.` `>`  | `☓↺⚑⚐`    | done / running / scheduled / idle|
//! | 4        | `8`              | `∞`       | forever                          |
//!
//! The two-character ASCII smiley takes the place of the blank that
//! separates positions 2 and 3 in the Unicode form.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::errors::Result;
use crate::job::{Job, JobId, JobStatus};

use super::scheduler::{Scheduler, id_of};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeStyle {
    Ascii,
    Unicode,
}

impl BadgeStyle {
    /// Unicode when the locale says UTF-8 and `JOBDAG_ASCII` is unset.
    pub fn detect() -> Self {
        static STYLE: OnceLock<BadgeStyle> = OnceLock::new();
        *STYLE.get_or_init(|| {
            if std::env::var_os("JOBDAG_ASCII").is_some() {
                return BadgeStyle::Ascii;
            }
            let locale = ["LC_ALL", "LC_CTYPE", "LANG"]
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|value| !value.is_empty())
                .unwrap_or_default()
                .to_lowercase();
            if locale.contains("utf-8") || locale.contains("utf8") {
                BadgeStyle::Unicode
            } else {
                BadgeStyle::Ascii
            }
        })
    }
}

impl Job {
    pub fn badge(&self, style: BadgeStyle) -> String {
        let status = self.status();
        let raised = status.raised().is_some();
        let (crit, boom, phase, forever, sep) = match style {
            BadgeStyle::Ascii => (
                if self.is_critical() { "!" } else { " " },
                if raised {
                    ":("
                } else if status.is_running() {
                    ":)"
                } else {
                    "  "
                },
                phase_glyph(&status, ["x", "o", ".", ">"]),
                if self.is_forever() { "8" } else { " " },
                "",
            ),
            BadgeStyle::Unicode => (
                if self.is_critical() { "\u{26a0}" } else { " " },
                if raised {
                    "\u{2605}"
                } else if status.is_running() {
                    "\u{2609}"
                } else {
                    " "
                },
                phase_glyph(&status, ["\u{2613}", "\u{21ba}", "\u{2691}", "\u{2690}"]),
                if self.is_forever() { "\u{221e}" } else { " " },
                " ",
            ),
        };
        format!("{crit} {boom}{sep}{phase} {forever}")
    }

    pub fn repr_short(&self) -> String {
        self.badge(BadgeStyle::detect())
    }

    /// The result part of a listing line.
    pub fn repr_result(&self) -> String {
        match self.status() {
            JobStatus::Done(Err(err)) => {
                let severity = if self.is_critical() { "CRIT. EXC." } else { "exception" };
                format!("!! {severity} => {err}!!")
            }
            JobStatus::Done(Ok(value)) => format!("[[ -> {value}]]"),
            JobStatus::Cancelled => "[cancelled]".to_string(),
            _ => "[not done]".to_string(),
        }
    }

    fn repr_requires(&self, ids: &HashMap<JobId, String>) -> String {
        let required = self.required();
        if required.is_empty() {
            return String::new();
        }
        format!("requires={}", id_csv(ids, &required))
    }
}

fn phase_glyph<'a>(status: &JobStatus, glyphs: [&'a str; 4]) -> &'a str {
    if status.is_done() {
        glyphs[0]
    } else if status.is_running() {
        glyphs[1]
    } else if status.is_scheduled() {
        glyphs[2]
    } else {
        glyphs[3]
    }
}

fn id_csv(ids: &HashMap<JobId, String>, jobs: &[Job]) -> String {
    let joined = jobs
        .iter()
        .map(|job| id_of(ids, job))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{joined}}}")
}

struct Counts {
    done: usize,
    ongoing: usize,
    idle: usize,
    total: usize,
}

impl Scheduler {
    fn counts(&self) -> Counts {
        let done = self.jobs.iter().filter(|j| j.is_done()).count();
        let running = self.jobs.iter().filter(|j| j.is_running()).count();
        Counts {
            done,
            ongoing: running - done,
            idle: self.jobs.len() - running,
            total: self.jobs.len(),
        }
    }

    /// E.g. `2D + 3R + 4I = 9`.
    pub fn stats(&self) -> String {
        let c = self.counts();
        format!("{}D + {}R + {}I = {}", c.done, c.ongoing, c.idle, c.total)
    }

    /// All jobs in topological order, one per line, nested schedulers
    /// expanded in place. Fails if the graph has a cycle.
    pub fn list(&self, details: bool) -> Result<String> {
        let ids = self.sched_ids()?;
        let mut lines = Vec::new();
        self.list_into(&ids, details, 0, &mut lines)?;
        Ok(lines.join("\n"))
    }

    fn list_into(
        &self,
        ids: &HashMap<JobId, String>,
        details: bool,
        depth: usize,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        for job in self.topological_order()? {
            let id = id_of(ids, &job);
            match job.nested() {
                Some(inner) => {
                    let entries = id_csv(ids, &inner.entry_jobs());
                    let exits = id_csv(ids, &inner.exit_jobs(true));
                    lines.push(line(&[
                        id,
                        &job.repr_short(),
                        &">".repeat(depth + 1),
                        &job.to_string(),
                        &format!("{} -> entries={entries}", job.repr_requires(ids)),
                    ]));
                    inner.list_into(ids, details, depth + 1, lines)?;
                    lines.push(line(&[
                        id,
                        "--end--",
                        &"<".repeat(depth + 1),
                        &job.to_string(),
                        &format!("exits={exits}"),
                    ]));
                }
                None => {
                    let indent = if depth > 0 {
                        format!("{} ", ">".repeat(depth))
                    } else {
                        String::new()
                    };
                    lines.push(line(&[
                        id,
                        &job.repr_short(),
                        &format!("{indent}{job}"),
                        &job.repr_result(),
                        &job.repr_requires(ids),
                    ]));
                    if details {
                        if let Some(extra) = job.runnable().details() {
                            lines.push(extra);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Like [`Scheduler::list`] but in insertion order, so it works on a
    /// graph with cycles. Ids are positional (`2.1` is the first job of the
    /// scheduler wrapped by job `2`).
    pub fn list_safe(&self) -> String {
        let mut ids = HashMap::new();
        self.safe_ids("", &mut ids);
        let mut lines = Vec::new();
        self.list_safe_into(&ids, &mut lines);
        lines.join("\n")
    }

    fn safe_ids(&self, prefix: &str, ids: &mut HashMap<JobId, String>) {
        for (index, job) in self.jobs.iter().enumerate() {
            let id = format!("{prefix}{}", index + 1);
            if let Some(inner) = job.nested() {
                inner.safe_ids(&format!("{id}."), ids);
            }
            ids.insert(job.id(), id);
        }
    }

    fn list_safe_into(&self, ids: &HashMap<JobId, String>, lines: &mut Vec<String>) {
        for job in &self.jobs {
            lines.push(line(&[
                &job.repr_short(),
                id_of(ids, job),
                &job.to_string(),
                &job.repr_requires(ids),
            ]));
            if let Some(inner) = job.nested() {
                inner.list_safe_into(ids, lines);
            }
        }
    }

    /// Report for a failed run: why, a listing, and the raised errors
    /// (critical ones first).
    pub fn debrief(&self, details: bool) -> Result<String> {
        let c = self.counts();
        let mut out = vec![
            format!("{} {}", "-".repeat(5), self.why()),
            format!(
                "scheduler has a total of {} jobs, {}, {}, {}",
                c.total,
                legible(c.done, "done"),
                legible(c.ongoing, "ongoing"),
                legible(c.idle, "idle (or scheduled but not running)")
            ),
            self.list(details)?,
        ];

        let order = self.topological_order()?;
        let raised: Vec<&Job> = order.iter().filter(|j| j.raised_exception().is_some()).collect();
        if !raised.is_empty() {
            let criticals = raised.iter().filter(|j| j.is_critical()).count();
            out.push(format!(
                "===== {} job(s) with an exception, including {} critical",
                raised.len(),
                criticals
            ));
            let ids = self.sched_ids()?;
            for job in raised.iter().filter(|j| j.is_critical()) {
                if let Some(err) = job.raised_exception() {
                    out.push(format!(
                        "CRITICAL JOB {} {} {}: {err:#}",
                        id_of(&ids, job),
                        job.repr_short(),
                        job
                    ));
                }
            }
            for job in raised.iter().filter(|j| !j.is_critical()) {
                if let Some(err) = job.raised_exception() {
                    out.push(format!("non-critical: {}: exception {err}", job.label()));
                }
            }
        }
        Ok(out.join("\n"))
    }
}

fn line(parts: &[&str]) -> String {
    parts.join(" ").trim_end().to_string()
}

fn legible(number: usize, adjective: &str) -> String {
    match number {
        0 => format!("none is {adjective}"),
        1 => format!("1 is {adjective}"),
        n => format!("{n} are {adjective}"),
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.counts();
        write!(
            f,
            "Scheduler with {} done + {} ongoing + {} idle = {} job(s)",
            c.done, c.ongoing, c.idle, c.total
        )
    }
}
