// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// jobs_window = 4
/// timeout = "10m"
///
/// [job.fetch]
/// cmd = "curl -sO https://example.org/data.tgz"
///
/// [job.unpack]
/// cmd = "tar xzf data.tgz"
/// requires = ["fetch"]
///
/// [scheduler.deploy]
/// jobs_window = 2
/// requires = ["unpack"]
///
/// [job.push]
/// cmd = "./push.sh"
/// scheduler = "deploy"
/// ```
///
/// All sections are optional at this stage; validation decides what is
/// actually required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// `[job.<name>]` tables.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,

    /// `[scheduler.<name>]` tables: nested schedulers.
    #[serde(default)]
    pub scheduler: BTreeMap<String, NestedConfig>,
}

/// A validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub job: BTreeMap<String, JobConfig>,
    pub scheduler: BTreeMap<String, NestedConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        job: BTreeMap<String, JobConfig>,
        scheduler: BTreeMap<String, NestedConfig>,
    ) -> Self {
        Self {
            config,
            job,
            scheduler,
        }
    }

    /// Requirements of a job or nested scheduler, by name.
    pub fn requires_of(&self, name: &str) -> Option<&[String]> {
        self.job
            .get(name)
            .map(|j| j.requires.as_slice())
            .or_else(|| self.scheduler.get(name).map(|s| s.requires.as_slice()))
    }

    /// The nested scheduler a job or scheduler belongs to, by name.
    pub fn scope_of(&self, name: &str) -> Option<&str> {
        self.job
            .get(name)
            .and_then(|j| j.scheduler.as_deref())
            .or_else(|| self.scheduler.get(name).and_then(|s| s.scheduler.as_deref()))
    }
}

/// `[config]` section: options of the top-level scheduler.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigSection {
    /// Max jobs running at once; absent or 0 means unbounded.
    #[serde(default)]
    pub jobs_window: Option<usize>,

    /// Duration string, e.g. `"30s"`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Duration string, or `"none"` to wait for hooks indefinitely.
    #[serde(default)]
    pub shutdown_timeout: Option<String>,

    #[serde(default)]
    pub label: Option<String>,
}

/// `[job.<name>]` section: a shell command.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub cmd: String,

    #[serde(default)]
    pub label: Option<String>,

    #[serde(default = "default_critical")]
    pub critical: bool,

    #[serde(default)]
    pub forever: bool,

    /// Names of jobs or schedulers in the same scope.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Nested scheduler this job belongs to; top level when absent.
    #[serde(default)]
    pub scheduler: Option<String>,
}

/// `[scheduler.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedConfig {
    #[serde(default)]
    pub label: Option<String>,

    #[serde(default)]
    pub jobs_window: Option<usize>,

    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub shutdown_timeout: Option<String>,

    #[serde(default = "default_critical")]
    pub critical: bool,

    #[serde(default)]
    pub forever: bool,

    #[serde(default)]
    pub requires: Vec<String>,

    /// Parent scheduler; top level when absent.
    #[serde(default)]
    pub scheduler: Option<String>,
}

fn default_critical() -> bool {
    true
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}

/// `"none"` disables the shutdown bound; anything else is a duration.
pub fn parse_shutdown_timeout(s: &str) -> Result<Option<Duration>, String> {
    if s.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_duration(s).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert!(parse_duration("3").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn shutdown_timeout_none() {
        assert_eq!(parse_shutdown_timeout("none"), Ok(None));
        assert_eq!(
            parse_shutdown_timeout("5s"),
            Ok(Some(Duration::from_secs(5)))
        );
    }

    #[test]
    fn job_defaults() {
        let raw: RawConfigFile = toml::from_str(
            r#"
            [job.a]
            cmd = "true"
            "#,
        )
        .unwrap();
        let a = &raw.job["a"];
        assert!(a.critical);
        assert!(!a.forever);
        assert!(a.requires.is_empty());
        assert!(raw.scheduler.is_empty());
        assert_eq!(raw.config.jobs_window, None);
    }
}
