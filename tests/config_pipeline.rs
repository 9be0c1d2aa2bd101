// tests/config_pipeline.rs
mod common;

use std::error::Error;
use std::fs;

use jobdag::JobdagError;
use jobdag::cli::CliArgs;
use jobdag::config::{ConfigFile, build_scheduler, load_and_validate};
use tempfile::TempDir;

use crate::common::builders::{ConfigFileBuilder, JobConfigBuilder, NestedConfigBuilder};
use crate::common::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("Jobdag.toml");
    fs::write(&path, contents).expect("write config");
    path
}

fn cli(config: &std::path::Path) -> CliArgs {
    CliArgs {
        config: config.display().to_string(),
        log_level: None,
        dry_run: false,
        dot: None,
        check: false,
        details: false,
    }
}

#[test]
fn toml_file_builds_a_nested_scheduler_tree() -> TestResult {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[config]
jobs_window = 3
timeout = "1m"
label = "pipeline"

[job.fetch]
cmd = "true"

[scheduler.deploy]
jobs_window = 1
requires = ["fetch"]

[job.push]
cmd = "true"
scheduler = "deploy"

[job.notify]
cmd = "true"
scheduler = "deploy"
requires = ["push"]
critical = false
"#,
    );

    let cfg = load_and_validate(&path)?;
    let scheduler = build_scheduler(&cfg)?;

    assert_eq!(scheduler.text_label(), "pipeline");
    assert_eq!(scheduler.options().jobs_window, Some(3));
    assert_eq!(scheduler.len(), 2);
    let deploy = scheduler
        .jobs()
        .iter()
        .find(|j| j.label() == "deploy")
        .expect("deploy wrapper");
    assert_eq!(deploy.required().len(), 1);
    let inner = deploy.nested().expect("deploy is a scheduler");
    assert_eq!(inner.options().jobs_window, Some(1));
    assert_eq!(inner.len(), 2);
    assert!(scheduler.check_cycles());
    Ok(())
}

#[test]
fn invalid_configs_are_rejected() {
    let cycle = ConfigFileBuilder::new()
        .with_job("a", JobConfigBuilder::new("true").requires("b").build())
        .with_job("b", JobConfigBuilder::new("true").requires("a").build())
        .build_raw();
    assert!(matches!(ConfigFile::try_from(cycle), Err(JobdagError::DagCycle(_))));

    let unknown = ConfigFileBuilder::new()
        .with_job("a", JobConfigBuilder::new("true").requires("ghost").build())
        .build_raw();
    assert!(matches!(
        ConfigFile::try_from(unknown),
        Err(JobdagError::ConfigError(_))
    ));

    let cross_scope = ConfigFileBuilder::new()
        .with_scheduler("inner", NestedConfigBuilder::new().build())
        .with_job("a", JobConfigBuilder::new("true").build())
        .with_job(
            "b",
            JobConfigBuilder::new("true")
                .scheduler("inner")
                .requires("a")
                .build(),
        )
        .build_raw();
    let err = ConfigFile::try_from(cross_scope).unwrap_err();
    assert!(err.to_string().contains("different scheduler"), "{err}");

    let bad_timeout = ConfigFileBuilder::new()
        .timeout("soon")
        .with_job("a", JobConfigBuilder::new("true").build())
        .build_raw();
    assert!(ConfigFile::try_from(bad_timeout).is_err());

    let empty = ConfigFileBuilder::new().build_raw();
    assert!(ConfigFile::try_from(empty).is_err());
}

#[test]
fn malformed_toml_is_a_toml_error() -> TestResult {
    let dir = TempDir::new()?;
    let path = write_config(&dir, "[job.a\ncmd = ");
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, JobdagError::TomlError(_)));
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn commands_run_in_dependency_order() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let out = dir.path().join("out.txt");
    let out = out.display();
    let cfg = ConfigFileBuilder::new()
        .jobs_window(2)
        .with_job("first", JobConfigBuilder::new(&format!("echo first >> {out}")).build())
        .with_job(
            "second",
            JobConfigBuilder::new(&format!("sleep 0.05; echo second >> {out}"))
                .requires("first")
                .build(),
        )
        .with_job(
            "third",
            JobConfigBuilder::new(&format!("echo third >> {out}"))
                .requires("second")
                .build(),
        )
        .build();
    let scheduler = build_scheduler(&cfg)?;

    assert!(with_timeout(scheduler.run()).await?);

    let written = fs::read_to_string(dir.path().join("out.txt"))?;
    assert_eq!(written.lines().collect::<Vec<_>>(), ["first", "second", "third"]);
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_fails_the_run() -> TestResult {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_job("ok", JobConfigBuilder::new("true").build())
        .with_job("broken", JobConfigBuilder::new("exit 3").requires("ok").build())
        .build();
    let scheduler = build_scheduler(&cfg)?;

    assert!(!with_timeout(scheduler.run()).await?);

    assert!(scheduler.failed_critical());
    let debrief = scheduler.debrief(false)?;
    assert!(debrief.contains("exited with status 3"), "{debrief}");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn binary_entry_point_honours_check_and_dry_run() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        r#"
[job.a]
cmd = "true"

[job.b]
cmd = "false"
requires = ["a"]
critical = false
"#,
    );
    let dot = dir.path().join("graph.dot");

    let mut args = cli(&path);
    args.check = true;
    args.dot = Some(dot.clone());
    jobdag::run(args).await?;
    assert!(fs::read_to_string(&dot)?.starts_with("digraph"));

    let mut args = cli(&path);
    args.dry_run = true;
    jobdag::run(args).await?;

    // the non-critical failure does not fail the run
    with_timeout(jobdag::run(cli(&path))).await?;
    Ok(())
}
