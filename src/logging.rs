// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Level selection, first match wins:
//! 1. `--log-level` CLI flag
//! 2. `JOBDAG_LOG`, either a bare level ("debug") or full filter
//!    directives ("jobdag::engine=trace,info")
//! 3. `info`
//!
//! Logs go to stderr; stdout belongs to the jobs and to listings.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "JOBDAG_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = select_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn select_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(level_name(lvl));
    }
    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn level_name(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env() {
        let filter = select_filter(Some(LogLevel::Warn), Some("trace"));
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn env_directives_are_accepted() {
        let filter = select_filter(None, Some("jobdag::engine=trace,info"));
        assert!(filter.to_string().contains("jobdag::engine=trace"));
    }

    #[test]
    fn garbage_env_falls_back_to_info() {
        assert_eq!(select_filter(None, Some("jobdag=notalevel")).to_string(), "info");
        assert_eq!(select_filter(None, None).to_string(), "info");
    }
}
