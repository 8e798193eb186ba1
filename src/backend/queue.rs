// src/backend/queue.rs

//! External batch-queue backend (`sbatch` / `sacct` compatible).
//!
//! Submission synthesises an `sbatch`-style argument list from the job's
//! [`QueueParams`], runs the submission tool synchronously and takes the last
//! whitespace-delimited token of its stdout as the external job id. Polling
//! runs the accounting tool for that id and maps its state token.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendFuture, ExecutionBackend, JobCompletion, PollStatus, SubmitOutcome, SubmitRequest,
};
use crate::errors::{JobflowError, Result};
use crate::job::{JobHandle, QueueParams, Runnable};

/// Tick interval for queue jobs; every poll is a CLI round trip.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Separator between job ids in an `afterok` dependency directive.
const DEPENDENCY_SEPARATOR: &str = ":";

/// Where and how to reach the batch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Submission tool, `sbatch` by default.
    pub submit_program: String,
    /// Accounting/status tool, `sacct` by default.
    pub status_program: String,
    /// Directory (relative to the job's working dir) for `--output`/`--error`.
    pub log_dir: PathBuf,
    /// Parameters applied to every job unless the job overrides them.
    pub defaults: QueueParams,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            submit_program: "sbatch".to_string(),
            status_program: "sacct".to_string(),
            log_dir: PathBuf::from("slurm_logs"),
            defaults: QueueParams::default(),
        }
    }
}

/// State token reported by the accounting tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueState {
    Completed,
    Failed,
    Cancelled,
    Timeout,
    /// Any other token (`PENDING`, `RUNNING`, `COMPLETING`, ...).
    Active(String),
    /// No state could be read (empty output, tool error).
    Unknown,
}

impl QueueState {
    /// Parse the first state token of `sacct --noheader --parsable2` output.
    ///
    /// Only the first line is considered (the allocation itself, not its
    /// steps) and only its first word, so `CANCELLED by 1234` maps to
    /// `Cancelled`.
    pub fn parse(stdout: &str) -> Self {
        let token = stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| line.split_whitespace().next());

        match token.map(|t| t.trim_end_matches('+').to_uppercase()) {
            None => QueueState::Unknown,
            Some(t) => match t.as_str() {
                "COMPLETED" => QueueState::Completed,
                "FAILED" => QueueState::Failed,
                "CANCELLED" => QueueState::Cancelled,
                "TIMEOUT" => QueueState::Timeout,
                _ => QueueState::Active(t),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueState::Completed | QueueState::Failed | QueueState::Cancelled | QueueState::Timeout
        )
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::Completed => f.write_str("COMPLETED"),
            QueueState::Failed => f.write_str("FAILED"),
            QueueState::Cancelled => f.write_str("CANCELLED"),
            QueueState::Timeout => f.write_str("TIMEOUT"),
            QueueState::Active(token) => f.write_str(token),
            QueueState::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Take the external job id from submission output ("Submitted batch job 123").
pub fn parse_job_id(stdout: &str) -> Option<String> {
    stdout.split_whitespace().last().map(str::to_string)
}

/// Build the submission argument list for one job.
///
/// `params` should already be merged over the backend defaults.
pub fn build_submit_args(
    name: &str,
    runnable: &Runnable,
    params: &QueueParams,
    dependency_handles: &[JobHandle],
    log_dir: &Path,
) -> Vec<String> {
    let mut args = vec![format!("--job-name={name}")];

    if let Some(partition) = &params.partition {
        args.push(format!("--partition={partition}"));
    }
    if let Some(memory) = &params.memory {
        args.push(format!("--mem={memory}"));
    }
    if let Some(time_limit) = &params.time_limit {
        args.push(format!("--time={time_limit}"));
    }
    if let Some(nodes) = params.nodes {
        args.push(format!("--nodes={nodes}"));
    }
    if let Some(ntasks) = params.ntasks {
        args.push(format!("--ntasks={ntasks}"));
    }
    if let Some(cpus) = params.cpus_per_task {
        args.push(format!("--cpus-per-task={cpus}"));
    }
    if let Some(qos) = &params.qos {
        args.push(format!("--qos={qos}"));
    }

    if !dependency_handles.is_empty() {
        let ids: Vec<&str> = dependency_handles.iter().map(JobHandle::as_str).collect();
        args.push(format!(
            "--dependency=afterok:{}",
            ids.join(DEPENDENCY_SEPARATOR)
        ));
    }

    args.push(format!(
        "--output={}",
        log_dir.join(format!("{name}_%j.out")).display()
    ));
    args.push(format!(
        "--error={}",
        log_dir.join(format!("{name}_%j.err")).display()
    ));

    match runnable {
        Runnable::Script { path, .. } => args.push(path.display().to_string()),
        Runnable::Command { command } => args.push(format!("--wrap={command}")),
    }

    args
}

/// Submits jobs to an external batch queue and polls their accounting state.
///
/// Handles are the queue's job ids.
#[derive(Debug, Default)]
pub struct QueueBackend {
    config: QueueConfig,
    /// Terminal results already observed, keyed by external id.
    finished: HashMap<JobHandle, JobCompletion>,
}

impl QueueBackend {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            finished: HashMap::new(),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn enqueue(&self, request: SubmitRequest) -> Result<SubmitOutcome> {
        let submission_error = |message: String| JobflowError::Submission {
            job: request.name.clone(),
            message,
        };

        let params = request
            .runnable
            .queue_params()
            .map(|p| p.merged_over(&self.config.defaults))
            .unwrap_or_else(|| self.config.defaults.clone());

        let args = build_submit_args(
            &request.name,
            &request.runnable,
            &params,
            &request.dependency_handles,
            &self.config.log_dir,
        );

        let log_dir = request.working_dir.join(&self.config.log_dir);
        tokio::fs::create_dir_all(&log_dir).await.map_err(|e| {
            submission_error(format!("creating log dir '{}': {e}", log_dir.display()))
        })?;

        info!(
            job = %request.name,
            program = %self.config.submit_program,
            ?args,
            "submitting job to batch queue"
        );

        let output = Command::new(&self.config.submit_program)
            .args(&args)
            .current_dir(&request.working_dir)
            .output()
            .await
            .map_err(|e| {
                submission_error(format!(
                    "running '{}': {e}",
                    self.config.submit_program
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(job = %request.name, %stderr, "batch submission rejected");
            return Err(submission_error(format!(
                "'{}' exited with {}: {stderr}",
                self.config.submit_program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = parse_job_id(&stdout).ok_or_else(|| {
            submission_error(format!(
                "no job id in '{}' output",
                self.config.submit_program
            ))
        })?;

        info!(job = %request.name, external_id = %id, "job submitted to batch queue");
        Ok(SubmitOutcome::Started(JobHandle::new(id)))
    }

    async fn query(&self, handle: &JobHandle) -> QueueState {
        let result = Command::new(&self.config.status_program)
            .args(["-j", handle.as_str(), "--format=State", "--noheader", "--parsable2"])
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() => {
                QueueState::parse(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    handle = %handle,
                    status = %output.status,
                    "status query exited unsuccessfully"
                );
                QueueState::Unknown
            }
            Err(err) => {
                debug!(handle = %handle, error = %err, "status query could not run");
                QueueState::Unknown
            }
        }
    }

    async fn check(&mut self, handle: &JobHandle) -> PollStatus {
        if let Some(done) = self.finished.get(handle) {
            return PollStatus::Terminal(done.clone());
        }

        let state = self.query(handle).await;
        let completion = match &state {
            QueueState::Completed => JobCompletion::succeeded(),
            QueueState::Failed | QueueState::Cancelled | QueueState::Timeout => {
                JobCompletion::failed(format!("batch queue reported {state}"))
            }
            QueueState::Active(token) => {
                debug!(handle = %handle, state = %token, "queue job still active");
                return PollStatus::StillRunning;
            }
            QueueState::Unknown => {
                return PollStatus::Unknown(format!(
                    "no state from '{}' for job {handle}",
                    self.config.status_program
                ));
            }
        };

        debug!(handle = %handle, ?state, "queue job reached terminal state");
        self.finished.insert(handle.clone(), completion.clone());
        PollStatus::Terminal(completion)
    }
}

impl ExecutionBackend for QueueBackend {
    fn name(&self) -> &'static str {
        "queue"
    }

    fn default_poll_interval(&self) -> Duration {
        QUEUE_POLL_INTERVAL
    }

    fn submit(&mut self, request: SubmitRequest) -> BackendFuture<'_, Result<SubmitOutcome>> {
        Box::pin(self.enqueue(request))
    }

    fn poll<'a>(&'a mut self, handle: &'a JobHandle) -> BackendFuture<'a, PollStatus> {
        Box::pin(self.check(handle))
    }
}
