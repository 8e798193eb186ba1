// src/job/record.rs

//! Job records: static description plus mutable run state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::job::{DependencySet, JobName, QueueParams, Runnable};

/// Lifecycle state of a job.
///
/// `Pending -> Running -> {Succeeded, Failed}`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Registered, waiting for dependencies and/or capacity.
    Pending,
    /// Accepted by the backend; tracked in the in-flight set.
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Backend-specific identifier for an in-flight job: a process id for the
/// local backend, the external job id for the queue backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        JobHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output captured from a finished local process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Everything a caller supplies when registering a job.
///
/// ```
/// use jobflow::job::JobSpec;
///
/// let spec = JobSpec::command("equilibration", "lmp -in in.equ")
///     .working_dir("sim")
///     .depends_on("minimization");
/// assert_eq!(spec.name, "equilibration");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: JobName,
    pub runnable: Runnable,
    pub working_dir: PathBuf,
    pub depends_on: DependencySet,
}

impl JobSpec {
    pub fn new(name: impl Into<JobName>, runnable: Runnable) -> Self {
        Self {
            name: name.into(),
            runnable,
            working_dir: PathBuf::from("."),
            depends_on: DependencySet::new(),
        }
    }

    /// Job running a shell command line.
    pub fn command(name: impl Into<JobName>, command: impl Into<String>) -> Self {
        Self::new(name, Runnable::command(command))
    }

    /// Job running a batch script with the given queue parameters.
    pub fn script(name: impl Into<JobName>, path: impl Into<PathBuf>, params: QueueParams) -> Self {
        Self::new(name, Runnable::script(path, params))
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Replace the dependency set. Accepts a single name or any collection
    /// of names.
    pub fn depends_on(mut self, deps: impl Into<DependencySet>) -> Self {
        self.depends_on = deps.into();
        self
    }
}

/// A registered job as tracked by the scheduler.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub name: JobName,
    pub runnable: Runnable,
    pub working_dir: PathBuf,
    pub depends_on: DependencySet,
    pub status: JobStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub handle: Option<JobHandle>,
    pub exit_code: Option<i32>,
    pub output: Option<JobOutput>,
    /// Why the job failed to start or could not be queried, if it did.
    pub error: Option<String>,
}

impl JobRecord {
    pub fn from_spec(spec: JobSpec) -> Self {
        Self {
            name: spec.name,
            runnable: spec.runnable,
            working_dir: spec.working_dir,
            depends_on: spec.depends_on,
            status: JobStatus::Pending,
            start_time: None,
            end_time: None,
            handle: None,
            exit_code: None,
            output: None,
            error: None,
        }
    }

    /// Wall-clock time between start and end, if both are known.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.end_time? - self.start_time?)
    }

    pub(crate) fn mark_running(&mut self, handle: JobHandle) {
        debug_assert_eq!(self.status, JobStatus::Pending);
        self.status = JobStatus::Running;
        self.start_time = Some(Utc::now());
        self.handle = Some(handle);
    }

    /// Move a job to a terminal state. No-op if it is already terminal.
    pub(crate) fn mark_finished(&mut self, status: JobStatus) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }
}
