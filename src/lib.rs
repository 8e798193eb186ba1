// src/lib.rs

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod job;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backend::{ExecutionBackend, LocalBackend, QueueBackend};
use crate::cli::CliArgs;
use crate::config::{ConfigFile, config_root_dir, load_and_validate};
use crate::engine::{RunOutcome, RunReport, Scheduler};
use crate::types::BackendKind;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, applies CLI overrides, then drives every
/// job through the selected backend until the run drains, gets stuck (with
/// `stuck_policy = "exit"`), hits the deadline, or Ctrl-C arrives.
///
/// Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunReport>> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    apply_overrides(&mut cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg, &config_path);
        return Ok(None);
    }

    let root = config_root_dir(&config_path);
    let report = match cfg.config.backend {
        BackendKind::Local => drive(LocalBackend::new(), &cfg, &root).await?,
        BackendKind::Queue => drive(QueueBackend::new(cfg.queue_config()), &cfg, &root).await?,
    };

    Ok(Some(report))
}

fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(backend) = args.backend {
        cfg.config.backend = backend;
    }
    if let Some(max) = args.max_concurrent {
        cfg.config.max_concurrent_jobs = usize::try_from(max).unwrap_or(usize::MAX);
    }
    if let Some(policy) = args.stuck_policy {
        cfg.config.stuck_policy = policy;
    }
    if args.deadline.is_some() {
        cfg.set_deadline(args.deadline);
    }
}

/// Register every configured job on a scheduler over `backend` and run it.
async fn drive<B: ExecutionBackend>(backend: B, cfg: &ConfigFile, root: &Path) -> Result<RunReport> {
    let mut scheduler = Scheduler::new(backend, cfg.scheduler_options());

    for spec in cfg.job_specs(root) {
        scheduler.add_job(spec)?;
    }

    let result = scheduler.run_jobs_until(shutdown_signal(cfg.deadline())).await;
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            print!("{}", scheduler.report(RunOutcome::Aborted));
            return Err(err).context("scheduler run aborted");
        }
    };
    info!(
        outcome = ?report.outcome,
        ticks = report.ticks,
        stuck = report.stuck().count(),
        "run complete"
    );
    Ok(report)
}

/// Resolves on Ctrl-C, or once `deadline` elapses when one is set.
async fn shutdown_signal(deadline: Option<Duration>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, stopping");
    };

    match deadline {
        Some(limit) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = tokio::time::sleep(limit) => {
                    warn!(deadline_ms = limit.as_millis() as u64, "deadline reached, stopping");
                }
            }
        }
        None => ctrl_c.await,
    }
}

/// Simple dry-run output: print settings, jobs, dependencies and runnables.
fn print_dry_run(cfg: &ConfigFile, config_path: &Path) {
    println!("jobflow dry-run ({})", config_path.display());
    println!("  config.backend = {:?}", cfg.config.backend);
    println!("  config.max_concurrent_jobs = {}", cfg.config.max_concurrent_jobs);
    println!("  config.stuck_policy = {:?}", cfg.config.stuck_policy);
    if let Some(interval) = cfg.poll_interval() {
        println!("  config.poll_interval = {interval:?}");
    }
    if let Some(deadline) = cfg.deadline() {
        println!("  config.deadline = {deadline:?}");
    }
    println!();

    println!("jobs ({}):", cfg.job.len());
    for job in cfg.job.iter() {
        println!("  - {}", job.name);
        if let Some(ref cmd) = job.cmd {
            println!("      cmd: {cmd}");
        }
        if let Some(ref script) = job.script {
            println!("      script: {}", script.display());
        }
        if let Some(ref dir) = job.working_dir {
            println!("      working_dir: {}", dir.display());
        }
        if !job.depends_on.is_empty() {
            let deps: Vec<&str> = job.depends_on.iter().collect();
            println!("      depends_on: {deps:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
