// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, parse_duration, parse_shutdown_timeout};
use crate::errors::{JobdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = JobdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.job, raw.scheduler))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_unique_names(cfg)?;
    validate_durations(cfg)?;
    validate_scopes(cfg)?;
    validate_requirements(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(JobdagError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_unique_names(cfg: &RawConfigFile) -> Result<()> {
    if let Some(name) = cfg.job.keys().find(|name| cfg.scheduler.contains_key(*name)) {
        return Err(JobdagError::ConfigError(format!(
            "'{name}' is defined both as a job and as a scheduler"
        )));
    }
    Ok(())
}

fn validate_durations(cfg: &RawConfigFile) -> Result<()> {
    let check = |owner: &str, field: &str, value: &Option<String>, shutdown: bool| {
        let Some(value) = value else {
            return Ok(());
        };
        let parsed = if shutdown {
            parse_shutdown_timeout(value).map(|_| ())
        } else {
            parse_duration(value).map(|_| ())
        };
        parsed.map_err(|e| JobdagError::ConfigError(format!("{owner}.{field}: {e}")))
    };

    check("[config]", "timeout", &cfg.config.timeout, false)?;
    check("[config]", "shutdown_timeout", &cfg.config.shutdown_timeout, true)?;
    for (name, nested) in cfg.scheduler.iter() {
        let owner = format!("[scheduler.{name}]");
        check(&owner, "timeout", &nested.timeout, false)?;
        check(&owner, "shutdown_timeout", &nested.shutdown_timeout, true)?;
    }
    Ok(())
}

/// `scheduler = "..."` must name a nested scheduler, and nesting must not loop.
fn validate_scopes(cfg: &RawConfigFile) -> Result<()> {
    let mut nesting: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in cfg.scheduler.keys() {
        nesting.add_node(name.as_str());
    }

    for (name, job) in cfg.job.iter() {
        if let Some(parent) = &job.scheduler {
            if !cfg.scheduler.contains_key(parent) {
                return Err(JobdagError::ConfigError(format!(
                    "job '{name}' belongs to unknown scheduler '{parent}'"
                )));
            }
        }
    }

    for (name, nested) in cfg.scheduler.iter() {
        let Some(parent) = &nested.scheduler else {
            continue;
        };
        if parent == name {
            return Err(JobdagError::ConfigError(format!(
                "scheduler '{name}' cannot be nested in itself"
            )));
        }
        if !cfg.scheduler.contains_key(parent) {
            return Err(JobdagError::ConfigError(format!(
                "scheduler '{name}' belongs to unknown scheduler '{parent}'"
            )));
        }
        nesting.add_edge(parent.as_str(), name.as_str(), ());
    }

    toposort(&nesting, None).map(|_| ()).map_err(|cycle| {
        JobdagError::ConfigError(format!(
            "scheduler nesting loops through '{}'",
            cycle.node_id()
        ))
    })
}

fn validate_requirements(cfg: &RawConfigFile) -> Result<()> {
    let nodes = cfg
        .job
        .iter()
        .map(|(name, job)| (name, &job.requires, &job.scheduler))
        .chain(
            cfg.scheduler
                .iter()
                .map(|(name, nested)| (name, &nested.requires, &nested.scheduler)),
        );

    for (name, requires, scope) in nodes {
        for dep in requires {
            if dep == name {
                return Err(JobdagError::ConfigError(format!(
                    "'{name}' cannot require itself"
                )));
            }
            let dep_scope = if let Some(job) = cfg.job.get(dep) {
                &job.scheduler
            } else if let Some(nested) = cfg.scheduler.get(dep) {
                &nested.scheduler
            } else {
                return Err(JobdagError::ConfigError(format!(
                    "'{name}' has unknown requirement '{dep}'"
                )));
            };
            if dep_scope != scope {
                return Err(JobdagError::ConfigError(format!(
                    "'{name}' requires '{dep}', which lives in a different scheduler"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: requirement -> dependent. Requirements never cross
    // scopes, so one graph covers every scheduler.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.job.keys().chain(cfg.scheduler.keys()) {
        graph.add_node(name.as_str());
    }
    for (name, job) in cfg.job.iter() {
        for dep in job.requires.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }
    for (name, nested) in cfg.scheduler.iter() {
        for dep in nested.requires.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(JobdagError::DagCycle(format!(
            "cycle detected in job graph involving '{}'",
            cycle.node_id()
        ))),
    }
}
