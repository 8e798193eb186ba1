// src/backend/mod.rs

//! Pluggable execution backends.
//!
//! The scheduler talks to an [`ExecutionBackend`] instead of spawning
//! processes itself, so the same dependency/admission loop drives both
//! backends, and tests can swap in a scripted fake.
//!
//! - [`local`] runs each job as a child process of this program.
//! - [`queue`] submits each job to an external batch queue and polls its
//!   accounting tool for the outcome.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;
use crate::job::{JobHandle, JobName, JobOutput, JobStatus, Runnable};

pub mod local;
pub mod queue;

pub use local::LocalBackend;
pub use queue::{QueueBackend, QueueConfig, QueueState};

/// Boxed future returned by backend methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A job the scheduler wants started now.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub name: JobName,
    pub runnable: Runnable,
    pub working_dir: PathBuf,
    /// Handles of this job's dependencies that have already been submitted.
    ///
    /// Backends that can express ordering themselves (the batch queue) turn
    /// these into a "run only after these succeed" directive.
    pub dependency_handles: Vec<JobHandle>,
}

/// Result of a submission that did not raise a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The job is in flight and can be polled through this handle.
    Started(JobHandle),
    /// The job could not be started; it is recorded as failed immediately and
    /// never reaches `Running`.
    StartFailed(String),
}

/// Terminal result reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    /// `Succeeded` or `Failed`.
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub output: Option<JobOutput>,
    pub error: Option<String>,
}

impl JobCompletion {
    pub fn succeeded() -> Self {
        Self {
            status: JobStatus::Succeeded,
            exit_code: None,
            output: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            exit_code: None,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Map a process exit code: zero succeeds, anything else fails.
    pub fn from_exit_code(code: i32) -> Self {
        let status = if code == 0 {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        Self {
            status,
            exit_code: Some(code),
            output: None,
            error: None,
        }
    }

    pub fn with_output(mut self, output: JobOutput) -> Self {
        self.output = Some(output);
        self
    }
}

/// Answer to a single non-blocking status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    StillRunning,
    Terminal(JobCompletion),
    /// The status could not be determined this time (e.g. the query tool
    /// errored). Treated as still running and retried on the next tick.
    Unknown(String),
}

/// Trait abstracting how admitted jobs are started and observed.
///
/// Implementations own whatever per-job state they need (child processes,
/// cached queue states) keyed by the handle they return from `submit`.
/// They never touch job records; the scheduler applies their results.
pub trait ExecutionBackend: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Interval between ticks when nothing changed.
    fn default_poll_interval(&self) -> Duration;

    /// Start (or enqueue) a job.
    ///
    /// `Err` is a hard submission error: the job gets no handle and the
    /// scheduler surfaces the error to its caller.
    fn submit(&mut self, request: SubmitRequest) -> BackendFuture<'_, Result<SubmitOutcome>>;

    /// Check a previously returned handle without blocking on the job.
    ///
    /// Polling a handle that already reported a terminal result must return
    /// the same result again.
    fn poll<'a>(&'a mut self, handle: &'a JobHandle) -> BackendFuture<'a, PollStatus>;
}
