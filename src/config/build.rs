// src/config/build.rs

//! Turn a validated [`ConfigFile`] into a runnable [`Scheduler`] tree.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::config::model::{ConfigFile, parse_duration, parse_shutdown_timeout};
use crate::engine::{DEFAULT_SHUTDOWN_TIMEOUT, Scheduler, SchedulerOptions};
use crate::errors::{JobdagError, Result};
use crate::job::Job;
use crate::job::builtin::CommandJob;

/// Build the top-level scheduler, with nested schedulers built recursively.
pub fn build_scheduler(cfg: &ConfigFile) -> Result<Scheduler> {
    let options = scheduler_options(
        cfg.config.jobs_window,
        cfg.config.timeout.as_deref(),
        cfg.config.shutdown_timeout.as_deref(),
    )?;
    let mut scheduler = Scheduler::with_options(options)
        .label(cfg.config.label.clone().unwrap_or_else(|| "jobdag".to_string()));
    scheduler.update(build_scope(cfg, None)?);
    Ok(scheduler)
}

fn build_scope(cfg: &ConfigFile, scope: Option<&str>) -> Result<Vec<Job>> {
    let mut by_name: HashMap<&str, Job> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (name, job_cfg) in cfg.job.iter() {
        if job_cfg.scheduler.as_deref() != scope {
            continue;
        }
        let job = Job::builder(CommandJob::new(job_cfg.cmd.clone()))
            .label(job_cfg.label.clone().unwrap_or_else(|| name.clone()))
            .critical(job_cfg.critical)
            .forever(job_cfg.forever)
            .build();
        by_name.insert(name.as_str(), job);
        order.push(name.as_str());
    }

    for (name, nested) in cfg.scheduler.iter() {
        if nested.scheduler.as_deref() != scope {
            continue;
        }
        let label = nested.label.clone().unwrap_or_else(|| name.clone());
        let options = scheduler_options(
            nested.jobs_window,
            nested.timeout.as_deref(),
            nested.shutdown_timeout.as_deref(),
        )?;
        let mut inner = Scheduler::with_options(options).label(label.clone());
        inner.update(build_scope(cfg, Some(name))?);
        let job = inner
            .into_job()
            .label(label)
            .critical(nested.critical)
            .forever(nested.forever)
            .build();
        by_name.insert(name.as_str(), job);
        order.push(name.as_str());
    }

    for name in &order {
        let Some(requires) = cfg.requires_of(name) else {
            continue;
        };
        let Some(job) = by_name.get(name) else {
            continue;
        };
        for dep in requires {
            let required = by_name.get(dep.as_str()).ok_or_else(|| {
                JobdagError::ConfigError(format!("'{name}' has unknown requirement '{dep}'"))
            })?;
            job.requires(required);
        }
    }

    debug!(scope = scope.unwrap_or("<top>"), jobs = order.len(), "built scope");
    Ok(order
        .into_iter()
        .filter_map(|name| by_name.remove(name))
        .collect())
}

fn scheduler_options(
    jobs_window: Option<usize>,
    timeout: Option<&str>,
    shutdown_timeout: Option<&str>,
) -> Result<SchedulerOptions> {
    let timeout = timeout.map(parse_duration).transpose().map_err(JobdagError::ConfigError)?;
    let shutdown_timeout: Option<Duration> = match shutdown_timeout {
        Some(s) => parse_shutdown_timeout(s).map_err(JobdagError::ConfigError)?,
        None => Some(DEFAULT_SHUTDOWN_TIMEOUT),
    };
    Ok(SchedulerOptions {
        jobs_window,
        timeout,
        shutdown_timeout,
    })
}
