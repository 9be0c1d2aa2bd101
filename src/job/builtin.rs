// src/job/builtin.rs

//! Ready-made job bodies.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{JobContext, JobValue, Runnable};

/// A job whose body is an async closure.
pub struct FnJob<F> {
    func: F,
    text_label: Option<String>,
}

impl<F> FnJob<F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            text_label: None,
        }
    }

    pub fn with_text_label(mut self, label: impl Into<String>) -> Self {
        self.text_label = Some(label.into());
        self
    }
}

#[async_trait]
impl<F, Fut> Runnable for FnJob<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<JobValue>> + Send + 'static,
{
    async fn run(&self, ctx: JobContext) -> anyhow::Result<JobValue> {
        (self.func)(ctx).await
    }

    fn text_label(&self) -> Option<String> {
        self.text_label.clone()
    }

    fn kind(&self) -> &'static str {
        "FnJob"
    }
}

/// Sleeps for a fixed duration, then returns the number of seconds slept.
pub struct SleepJob {
    duration: Duration,
}

impl SleepJob {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Runnable for SleepJob {
    async fn run(&self, _ctx: JobContext) -> anyhow::Result<JobValue> {
        tokio::time::sleep(self.duration).await;
        Ok(JobValue::Float(self.duration.as_secs_f64()))
    }

    fn text_label(&self) -> Option<String> {
        Some(format!("sleep {:?}", self.duration))
    }

    fn kind(&self) -> &'static str {
        "SleepJob"
    }
}

/// Prints its messages on stdout, then optionally sleeps.
///
/// Mostly useful for demos and dry pipelines.
pub struct PrintJob {
    messages: Vec<String>,
    sleep: Option<Duration>,
    banner: Option<String>,
}

impl PrintJob {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            sleep: None,
            banner: None,
        }
    }

    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = Some(sleep);
        self
    }

    /// Printed before the messages; not part of `details`.
    pub fn banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }
}

#[async_trait]
impl Runnable for PrintJob {
    async fn run(&self, _ctx: JobContext) -> anyhow::Result<JobValue> {
        let line = self.messages.join(" ");
        match &self.banner {
            Some(banner) => println!("{banner} {line}"),
            None => println!("{line}"),
        }
        if let Some(sleep) = self.sleep {
            println!("Sleeping for {}s", sleep.as_secs_f64());
            tokio::time::sleep(sleep).await;
        }
        Ok(JobValue::None)
    }

    fn details(&self) -> Option<String> {
        let mut out = String::new();
        if let Some(sleep) = self.sleep {
            out.push_str(&format!("[+ sleep {}s] ", sleep.as_secs_f64()));
        }
        out.push_str("msg= ");
        out.push_str(self.messages.first().map(String::as_str).unwrap_or(""));
        if self.messages.len() > 1 {
            out.push_str("...");
        }
        Some(out)
    }

    fn kind(&self) -> &'static str {
        "PrintJob"
    }
}

/// Runs a shell command; a non-zero exit status is an error.
///
/// stdout lines are logged at info, stderr lines at debug. The child is
/// killed if the job gets cancelled or dropped.
pub struct CommandJob {
    cmd: String,
}

impl CommandJob {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Runnable for CommandJob {
    async fn run(&self, ctx: JobContext) -> anyhow::Result<JobValue> {
        info!(job = %ctx.label, cmd = %self.cmd, "starting command");

        let mut child = self
            .command()
            .spawn()
            .with_context(|| format!("spawning process for job '{}'", ctx.label))?;

        if let Some(stdout) = child.stdout.take() {
            let label = ctx.label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(job = %label, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let label = ctx.label.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(job = %label, "stderr: {}", line);
                }
            });
        }

        tokio::select! {
            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for process of job '{}'", ctx.label))?;
                let code = status.code().unwrap_or(-1);
                info!(
                    job = %ctx.label,
                    exit_code = code,
                    success = status.success(),
                    "command exited"
                );
                if !status.success() {
                    bail!("command `{}` exited with status {}", self.cmd, code);
                }
                Ok(JobValue::Int(i64::from(code)))
            }
            _ = ctx.cancelled() => {
                info!(job = %ctx.label, "cancellation requested; killing process");
                if let Err(err) = child.kill().await {
                    warn!(job = %ctx.label, error = %err, "failed to kill child process");
                }
                Err(crate::errors::JobdagError::Cancelled.into())
            }
        }
    }

    fn text_label(&self) -> Option<String> {
        Some(self.cmd.clone())
    }

    fn details(&self) -> Option<String> {
        Some(format!("sh -c '{}'", self.cmd))
    }

    fn kind(&self) -> &'static str {
        "CommandJob"
    }
}
