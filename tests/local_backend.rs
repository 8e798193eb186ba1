// tests/local_backend.rs

#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use jobflow::backend::LocalBackend;
use jobflow::cli::CliArgs;
use jobflow::engine::{RunOutcome, Scheduler, SchedulerOptions, StuckPolicy};
use jobflow::job::{JobSpec, JobStatus, StuckReason};
use jobflow_test_utils::{init_tracing, with_timeout, within};

type TestResult = Result<(), Box<dyn Error>>;

fn fast_options(max: usize) -> SchedulerOptions {
    SchedulerOptions {
        max_concurrent_jobs: max,
        poll_interval: Some(Duration::from_millis(10)),
        stuck_policy: StuckPolicy::Exit,
    }
}

#[tokio::test]
async fn dependent_job_sees_files_written_by_its_dependency() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let mut scheduler = Scheduler::new(LocalBackend::new(), fast_options(2));
    scheduler.add_job(JobSpec::command("write", "echo hello > shared.txt").working_dir(dir.path()))?;
    scheduler.add_job(
        JobSpec::command("read", "cat shared.txt; echo oops >&2")
            .working_dir(dir.path())
            .depends_on("write"),
    )?;

    let report = with_timeout(scheduler.run_jobs()).await?;
    assert_eq!(report.outcome, RunOutcome::Drained);
    assert!(report.all_succeeded());

    let read = scheduler.job("read").unwrap();
    let output = read.output.as_ref().unwrap();
    assert_eq!(output.stdout.trim(), "hello");
    assert_eq!(output.stderr.trim(), "oops");
    assert_eq!(read.exit_code, Some(0));
    assert!(read.start_time.is_some() && read.end_time.is_some());
    assert!(read.elapsed().is_some());

    assert_eq!(scheduler.backend().live_processes(), 0);
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_fails_and_blocks_dependents() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let mut scheduler = Scheduler::new(LocalBackend::new(), fast_options(2));
    scheduler.add_job(JobSpec::command("bad", "exit 3").working_dir(dir.path()))?;
    scheduler.add_job(
        JobSpec::command("after", "touch ran.txt")
            .working_dir(dir.path())
            .depends_on("bad"),
    )?;

    let report = with_timeout(scheduler.run_jobs()).await?;

    assert_eq!(report.outcome, RunOutcome::Stuck);
    assert_eq!(report.status_of("bad"), Some(JobStatus::Failed));
    assert_eq!(report.job("bad").and_then(|j| j.exit_code), Some(3));
    assert_eq!(report.status_of("after"), Some(JobStatus::Pending));
    assert_eq!(
        report.job("after").and_then(|j| j.stuck.clone()),
        Some(StuckReason::FailedDependency("bad".to_string()))
    );
    assert!(!dir.path().join("ran.txt").exists());
    Ok(())
}

#[tokio::test]
async fn missing_working_dir_fails_without_running() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let missing = dir.path().join("does-not-exist");

    let mut scheduler = Scheduler::new(LocalBackend::new(), fast_options(1));
    scheduler.add_job(JobSpec::command("lost", "true").working_dir(&missing))?;
    scheduler.add_job(JobSpec::command("fine", "true").working_dir(dir.path()))?;

    let report = with_timeout(scheduler.run_jobs()).await?;

    let lost = scheduler.job("lost").unwrap();
    assert_eq!(lost.status, JobStatus::Failed);
    assert!(lost.handle.is_none());
    assert!(lost.start_time.is_none());
    assert!(lost.error.as_deref().unwrap_or_default().contains("lost"));
    assert_eq!(report.status_of("fine"), Some(JobStatus::Succeeded));
    Ok(())
}

#[tokio::test]
async fn concurrency_limit_applies_to_real_processes() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    // Each job records how many peers are running when it starts.
    let body = "ls running | wc -l >> counts.txt; touch running/$$; sleep 0.2; rm running/$$";
    fs::create_dir(dir.path().join("running"))?;

    let mut scheduler = Scheduler::new(LocalBackend::new(), fast_options(2));
    for name in ["p1", "p2", "p3", "p4"] {
        scheduler.add_job(JobSpec::command(name, body).working_dir(dir.path()))?;
    }

    let report = with_timeout(scheduler.run_jobs()).await?;
    assert!(report.all_succeeded());

    let counts = fs::read_to_string(dir.path().join("counts.txt"))?;
    for line in counts.lines() {
        let peers: usize = line.trim().parse()?;
        assert!(peers < 2, "saw {peers} peers already running");
    }
    Ok(())
}

#[tokio::test]
async fn run_drives_a_config_file_end_to_end() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let config_path = dir.path().join("Jobflow.toml");
    fs::write(
        &config_path,
        r#"
[config]
backend = "local"
max_concurrent_jobs = 2
poll_interval = "10ms"

[[job]]
name = "prepare"
cmd = "mkdir -p out && echo data > out/input.txt"

[[job]]
name = "process"
cmd = "tr a-z A-Z < input.txt > result.txt"
working_dir = "out"
depends_on = "prepare"
"#,
    )?;

    let args = CliArgs {
        config: config_path.to_string_lossy().into_owned(),
        backend: None,
        max_concurrent: None,
        stuck_policy: Some(StuckPolicy::Exit),
        deadline: Some(Duration::from_secs(4)),
        log_level: None,
        dry_run: false,
    };

    let report = with_timeout(jobflow::run(args)).await?.expect("not a dry run");
    assert_eq!(report.outcome, RunOutcome::Drained);
    assert_eq!(report.exit_code(), 0);

    let result = fs::read_to_string(dir.path().join("out/result.txt"))?;
    assert_eq!(result.trim(), "DATA");
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    let dir = tempdir()?;
    let config_path = dir.path().join("Jobflow.toml");
    fs::write(
        &config_path,
        r#"
[[job]]
name = "touch"
cmd = "touch should-not-exist"
"#,
    )?;

    let args = CliArgs {
        config: config_path.to_string_lossy().into_owned(),
        backend: None,
        max_concurrent: None,
        stuck_policy: None,
        deadline: None,
        log_level: None,
        dry_run: true,
    };

    assert!(jobflow::run(args).await?.is_none());
    assert!(!dir.path().join("should-not-exist").exists());
    Ok(())
}

#[tokio::test]
async fn backgrounded_grandchild_does_not_hold_up_the_run() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let mut scheduler = Scheduler::new(LocalBackend::new(), fast_options(2));
    scheduler.add_job(JobSpec::command("spawner", "sleep 5 & echo hi").working_dir(dir.path()))?;
    scheduler.add_job(
        JobSpec::command("next", "echo next")
            .working_dir(dir.path())
            .depends_on("spawner"),
    )?;

    let started = Instant::now();
    let report = within(Duration::from_secs(3), scheduler.run_jobs()).await?;
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(report.outcome, RunOutcome::Drained);
    assert!(report.all_succeeded());

    let spawner = scheduler.job("spawner").unwrap();
    assert_eq!(spawner.output.as_ref().map(|o| o.stdout.trim()), Some("hi"));
    Ok(())
}

#[tokio::test]
async fn cancel_is_prompt_while_a_background_process_holds_output_open() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let mut options = fast_options(1);
    options.stuck_policy = StuckPolicy::Wait;
    let mut scheduler = Scheduler::new(LocalBackend::new(), options);
    scheduler.add_job(JobSpec::command("spawner", "sleep 4 & echo started").working_dir(dir.path()))?;
    scheduler.add_job(
        JobSpec::command("blocked", "true")
            .working_dir(dir.path())
            .depends_on("never-registered"),
    )?;

    let started = Instant::now();
    let shutdown = tokio::time::sleep(Duration::from_millis(500));
    let report = within(Duration::from_secs(3), scheduler.run_jobs_until(shutdown)).await?;
    let elapsed = started.elapsed();

    assert_eq!(report.outcome, RunOutcome::Cancelled);
    assert!(elapsed < Duration::from_millis(1500), "cancel took {elapsed:?}");
    assert_eq!(report.status_of("spawner"), Some(JobStatus::Succeeded));
    assert_eq!(report.status_of("blocked"), Some(JobStatus::Pending));
    Ok(())
}
