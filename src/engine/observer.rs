// src/engine/observer.rs

//! Reporting hook for job state transitions.
//!
//! The scheduler never configures logging itself; it calls a [`JobObserver`]
//! on every transition. [`TracingObserver`] is the default and emits
//! `tracing` events; tests can plug in a recorder.

use tracing::{debug, error, info, warn};

use crate::engine::report::RunReport;
use crate::job::{JobName, JobRecord, JobStatus, StuckReason};

/// Callbacks invoked by the scheduler loop. All methods default to no-ops.
pub trait JobObserver: Send {
    fn job_registered(&mut self, _job: &JobRecord) {}

    /// `Pending -> Running`.
    fn job_started(&mut self, _job: &JobRecord) {}

    /// `Pending -> Failed` because the backend could not start the job.
    fn job_start_failed(&mut self, _job: &JobRecord) {}

    /// `Running -> Succeeded | Failed`.
    fn job_finished(&mut self, _job: &JobRecord) {}

    /// A status query for an in-flight job returned nothing usable.
    fn poll_unknown(&mut self, _job: &JobRecord, _reason: &str) {}

    /// The loop found pending jobs that can never become ready.
    fn jobs_stuck(&mut self, _stuck: &[(JobName, StuckReason)]) {}

    fn run_finished(&mut self, _report: &RunReport) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Default observer: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl JobObserver for TracingObserver {
    fn job_registered(&mut self, job: &JobRecord) {
        if job.depends_on.is_empty() {
            info!(job = %job.name, "added job");
        } else {
            let deps: Vec<&str> = job.depends_on.iter().collect();
            info!(job = %job.name, depends_on = ?deps, "added job with dependencies");
        }
    }

    fn job_started(&mut self, job: &JobRecord) {
        info!(
            job = %job.name,
            handle = job.handle.as_ref().map(|h| h.as_str()).unwrap_or("-"),
            "started job"
        );
    }

    fn job_start_failed(&mut self, job: &JobRecord) {
        error!(
            job = %job.name,
            error = job.error.as_deref().unwrap_or("unknown error"),
            "error starting job"
        );
    }

    fn job_finished(&mut self, job: &JobRecord) {
        info!(
            job = %job.name,
            status = %job.status,
            exit_code = ?job.exit_code,
            "job completed"
        );

        if let Some(output) = &job.output {
            if !output.stdout.is_empty() {
                debug!(job = %job.name, stdout = %output.stdout.trim_end(), "job output");
            }
            if !output.stderr.is_empty() {
                warn!(job = %job.name, stderr = %output.stderr.trim_end(), "job errors");
            }
        }
        if job.status == JobStatus::Failed {
            if let Some(err) = &job.error {
                warn!(job = %job.name, error = %err, "job failure detail");
            }
        }
    }

    fn poll_unknown(&mut self, job: &JobRecord, reason: &str) {
        debug!(job = %job.name, reason, "job status unknown; retrying next tick");
    }

    fn jobs_stuck(&mut self, stuck: &[(JobName, StuckReason)]) {
        for (job, reason) in stuck {
            warn!(job = %job, reason = %reason, "job can never become ready");
        }
    }

    fn run_finished(&mut self, report: &RunReport) {
        info!(outcome = ?report.outcome, ticks = report.ticks, "scheduler loop finished");
        for job in &report.jobs {
            match &job.stuck {
                Some(reason) => info!(
                    job = %job.name,
                    status = %job.status,
                    reason = %reason,
                    "job final status (stuck)"
                ),
                None => info!(job = %job.name, status = %job.status, "job final status"),
            }
        }
    }
}
