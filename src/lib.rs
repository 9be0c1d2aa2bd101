// src/lib.rs

//! `jobdag`: run a dependency graph of async jobs.
//!
//! Jobs are wired together with `requires`, grouped in a [`Scheduler`], and
//! run with bounded concurrency, an optional global timeout and
//! critical-failure short-circuiting. Schedulers nest as jobs of other
//! schedulers. The `jobdag` binary builds such a graph of shell commands
//! from a TOML file.

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logging;
pub mod render;
pub mod sequence;

use std::path::PathBuf;

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{build_scheduler, load_and_validate};

pub use crate::engine::{Failure, Orchestrator, Scheduler, SchedulerJob, SchedulerOptions};
pub use crate::errors::JobdagError;
pub use crate::job::{Job, JobBuilder, JobContext, JobError, JobValue, Requirement, Runnable};
pub use crate::sequence::Sequence;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - scheduler construction
/// - optional DOT export, cycle check and dry-run listing
/// - Ctrl-C handling
/// - the run itself, with a debrief on failure
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let scheduler = build_scheduler(&cfg)?;

    if let Some(dot) = &args.dot {
        let message = scheduler.export_as_dotfile(dot)?;
        println!("{message}");
    }

    if args.check {
        if !scheduler.check_cycles() {
            eprintln!("{}", scheduler.list_safe());
            bail!("the job graph has a cycle");
        }
        let dropped = scheduler.sanitize();
        if dropped > 0 {
            println!("sanitize: dropped {dropped} requirement(s) on jobs outside their scheduler");
        }
        println!("{}: no cycle found, {}", config_path.display(), scheduler);
        return Ok(());
    }

    if args.dry_run {
        println!("jobdag dry-run: {}", scheduler);
        println!("{}", scheduler.list(args.details)?);
        return Ok(());
    }

    // Ctrl-C → cancel the run; jobs are aborted and shut down.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("Ctrl+C received; cancelling run");
            cancel.cancel();
        });
    }

    let ok = scheduler.run_until_cancelled(cancel).await?;
    if !ok {
        eprintln!("{}", scheduler.debrief(args.details)?);
        bail!("orchestration failed: {}", scheduler.why());
    }

    info!(stats = %scheduler.stats(), "orchestration complete");
    Ok(())
}
