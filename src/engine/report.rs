// src/engine/report.rs

//! Final per-job summary returned by the scheduler loop.

use std::fmt;

use crate::job::{JobHandle, JobName, JobRecord, JobStatus, StuckReason};

/// Why the scheduler loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing in flight and no job pending.
    Drained,
    /// Nothing in flight and every pending job is stuck (`StuckPolicy::Exit`).
    Stuck,
    /// The caller's shutdown signal fired first.
    Cancelled,
    /// A hard submission error stopped the loop; `tick` returned `Err`.
    Aborted,
}

/// Final state of a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub name: JobName,
    pub status: JobStatus,
    pub handle: Option<JobHandle>,
    pub exit_code: Option<i32>,
    pub elapsed: Option<chrono::Duration>,
    pub error: Option<String>,
    /// Set for pending jobs that can never become ready.
    pub stuck: Option<StuckReason>,
}

impl JobSummary {
    pub fn from_record(job: &JobRecord, stuck: Option<StuckReason>) -> Self {
        Self {
            name: job.name.clone(),
            status: job.status,
            handle: job.handle.clone(),
            exit_code: job.exit_code,
            elapsed: job.elapsed(),
            error: job.error.clone(),
            stuck,
        }
    }
}

/// Aggregate result of a scheduler run, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub ticks: u64,
    pub jobs: Vec<JobSummary>,
}

impl RunReport {
    pub fn job(&self, name: &str) -> Option<&JobSummary> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.job(name).map(|j| j.status)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.jobs.iter().all(|j| j.status == JobStatus::Succeeded)
    }

    /// Pending jobs that can never run, with the reason.
    pub fn stuck(&self) -> impl Iterator<Item = (&str, &StuckReason)> {
        self.jobs
            .iter()
            .filter_map(|j| j.stuck.as_ref().map(|r| (j.name.as_str(), r)))
    }

    /// Process exit code for a CLI run: 0 only if every job succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.all_succeeded() { 0 } else { 1 }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} jobs: {} succeeded, {} failed, {} pending, {} running ({:?})",
            self.jobs.len(),
            self.count(JobStatus::Succeeded),
            self.count(JobStatus::Failed),
            self.count(JobStatus::Pending),
            self.count(JobStatus::Running),
            self.outcome,
        )?;
        for job in &self.jobs {
            write!(f, "  {:<24} {:<10}", job.name, job.status.to_string())?;
            if let Some(code) = job.exit_code {
                write!(f, " exit={code}")?;
            }
            if let Some(elapsed) = job.elapsed {
                write!(f, " elapsed={}ms", elapsed.num_milliseconds())?;
            }
            if let Some(reason) = &job.stuck {
                write!(f, " stuck: {reason}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
