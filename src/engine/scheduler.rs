// src/engine/scheduler.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::{ExecutionBackend, SubmitOutcome, SubmitRequest};
use crate::engine::observer::{JobObserver, TracingObserver};
use crate::engine::poller::poll_in_flight;
use crate::engine::report::{JobSummary, RunOutcome, RunReport};
use crate::engine::tick::TickSummary;
use crate::errors::{JobflowError, Result};
use crate::job::{
    can_admit, next_ready, stuck_reasons, JobHandle, JobName, JobRecord, JobSpec, JobStatus,
    StuckReason,
};
use crate::types::StuckPolicy;

/// Tunables for the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Upper bound on simultaneously in-flight jobs. Must be at least 1.
    pub max_concurrent_jobs: usize,
    /// Wait between ticks that made no progress. `None` uses the backend's
    /// default interval.
    pub poll_interval: Option<Duration>,
    pub stuck_policy: StuckPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            poll_interval: None,
            stuck_policy: StuckPolicy::Wait,
        }
    }
}

/// Dependency-aware job scheduler driving a single [`ExecutionBackend`].
///
/// Owns every job record and the in-flight set; the backend only reports
/// poll results, which the completion poller applies. Records are kept in
/// registration order, which is also the tie-break between ready jobs.
pub struct Scheduler<B: ExecutionBackend> {
    backend: B,
    options: SchedulerOptions,
    observer: Box<dyn JobObserver>,
    jobs: Vec<JobRecord>,
    index: HashMap<JobName, usize>,
    /// Registration index -> backend handle.
    in_flight: BTreeMap<usize, JobHandle>,
    succeeded: HashSet<JobName>,
    ticks: u64,
}

impl<B: ExecutionBackend> fmt::Debug for Scheduler<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .field("jobs", &self.jobs.len())
            .field("in_flight", &self.in_flight)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl<B: ExecutionBackend> Scheduler<B> {
    /// Scheduler reporting through [`TracingObserver`].
    pub fn new(backend: B, options: SchedulerOptions) -> Self {
        Self::with_observer(backend, options, Box::new(TracingObserver))
    }

    pub fn with_observer(
        backend: B,
        options: SchedulerOptions,
        observer: Box<dyn JobObserver>,
    ) -> Self {
        Self {
            backend,
            options,
            observer,
            jobs: Vec::new(),
            index: HashMap::new(),
            in_flight: BTreeMap::new(),
            succeeded: HashSet::new(),
            ticks: 0,
        }
    }

    /// Register a job. Returns its name for use in other jobs' dependencies.
    ///
    /// Rejects duplicate names ([`JobflowError::DuplicateJob`]), empty names,
    /// empty dependency names and self-dependencies
    /// ([`JobflowError::InvalidJob`]). Dependencies on names that are not
    /// (yet) registered are accepted; such a job stays pending until the
    /// dependency is registered and succeeds.
    pub fn add_job(&mut self, spec: JobSpec) -> Result<JobName> {
        if spec.name.trim().is_empty() {
            return Err(JobflowError::invalid_job(&spec.name, "job name must not be empty"));
        }
        if self.index.contains_key(&spec.name) {
            return Err(JobflowError::DuplicateJob(spec.name));
        }
        if spec.depends_on.iter().any(|dep| dep.trim().is_empty()) {
            return Err(JobflowError::invalid_job(
                &spec.name,
                "dependency names must not be empty",
            ));
        }
        if spec.depends_on.contains(&spec.name) {
            return Err(JobflowError::invalid_job(&spec.name, "job cannot depend on itself"));
        }

        for dep in spec.depends_on.iter() {
            if !self.index.contains_key(dep) {
                debug!(job = %spec.name, dep, "dependency not registered yet");
            }
        }

        let name = spec.name.clone();
        let record = JobRecord::from_spec(spec);
        self.observer.job_registered(&record);
        self.index.insert(name.clone(), self.jobs.len());
        self.jobs.push(record);
        Ok(name)
    }

    /// All job records, in registration order.
    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }

    pub fn job(&self, name: &str) -> Option<&JobRecord> {
        self.index.get(name).map(|&idx| &self.jobs[idx])
    }

    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.job(name).map(|j| j.status)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Names of jobs that have succeeded so far.
    pub fn succeeded(&self) -> &HashSet<JobName> {
        &self.succeeded
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Ticks executed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Interval between idle ticks.
    pub fn poll_interval(&self) -> Duration {
        self.options
            .poll_interval
            .unwrap_or_else(|| self.backend.default_poll_interval())
    }

    /// No job in flight and none pending.
    pub fn is_drained(&self) -> bool {
        self.in_flight.is_empty() && !self.jobs.iter().any(|j| j.status == JobStatus::Pending)
    }

    /// Pending jobs that can never become ready, with the reason.
    /// Listed in registration order.
    pub fn stuck_jobs(&self) -> Vec<(JobName, StuckReason)> {
        let mut reasons = stuck_reasons(&self.jobs);
        self.jobs
            .iter()
            .filter_map(|j| reasons.remove(&j.name).map(|r| (j.name.clone(), r)))
            .collect()
    }

    /// Snapshot of every job's current state.
    pub fn report(&self, outcome: RunOutcome) -> RunReport {
        let mut stuck = stuck_reasons(&self.jobs);
        let jobs = self
            .jobs
            .iter()
            .map(|j| JobSummary::from_record(j, stuck.remove(&j.name)))
            .collect();

        RunReport {
            outcome,
            ticks: self.ticks,
            jobs,
        }
    }

    /// One pass of the loop: poll in-flight jobs, then admit ready jobs
    /// while capacity remains.
    ///
    /// Returns `Err` only for a hard submission error; the offending job is
    /// already marked `Failed` when that happens.
    pub async fn tick(&mut self) -> Result<TickSummary> {
        self.ticks += 1;

        let finished = poll_in_flight(
            &mut self.backend,
            &mut self.jobs,
            &mut self.in_flight,
            &mut self.succeeded,
            self.observer.as_mut(),
        )
        .await;

        let mut summary = TickSummary {
            finished,
            ..TickSummary::default()
        };

        while can_admit(self.in_flight.len(), self.options.max_concurrent_jobs) {
            let Some(idx) = self.next_ready_index() else {
                break;
            };
            let name = self.jobs[idx].name.clone();
            if self.admit(idx).await? {
                summary.started.push(name);
            } else {
                summary.start_failed.push(name);
            }
        }

        debug!(
            tick = self.ticks,
            in_flight = self.in_flight.len(),
            finished = ?summary.finished,
            started = ?summary.started,
            "scheduler tick"
        );

        Ok(summary)
    }

    /// Run until every job is terminal.
    ///
    /// With [`StuckPolicy::Wait`] and a permanently stuck job this never
    /// returns; use [`Scheduler::run_jobs_until`] to bound it.
    pub async fn run_jobs(&mut self) -> Result<RunReport> {
        self.run_jobs_until(std::future::pending::<()>()).await
    }

    /// Run until drained, stuck (with [`StuckPolicy::Exit`]), or until
    /// `shutdown` completes. The shutdown signal is checked once per tick and
    /// during every idle wait; jobs still pending or in flight when it fires
    /// are left as they are.
    ///
    /// On a hard submission error the observer still receives a final report
    /// with [`RunOutcome::Aborted`] before the error is returned.
    pub async fn run_jobs_until<F>(&mut self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let interval = self.poll_interval();
        info!(
            backend = self.backend.name(),
            jobs = self.jobs.len(),
            max_concurrent = self.options.max_concurrent_jobs,
            interval_ms = interval.as_millis() as u64,
            "scheduler loop started"
        );

        let mut reported_stuck = false;

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break RunOutcome::Cancelled,
                _ = std::future::ready(()) => {}
            }

            let summary = match self.tick().await {
                Ok(summary) => summary,
                Err(err) => {
                    let report = self.report(RunOutcome::Aborted);
                    self.observer.run_finished(&report);
                    return Err(err);
                }
            };

            if self.is_drained() {
                break RunOutcome::Drained;
            }

            if self.in_flight.is_empty() && self.next_ready_index().is_none() {
                if self.options.stuck_policy == StuckPolicy::Exit {
                    break RunOutcome::Stuck;
                }
                if !reported_stuck {
                    let stuck = self.stuck_jobs();
                    self.observer.jobs_stuck(&stuck);
                    reported_stuck = true;
                }
            }

            if summary.made_progress() {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => break RunOutcome::Cancelled,
            }
        };

        if outcome == RunOutcome::Stuck {
            let stuck = self.stuck_jobs();
            self.observer.jobs_stuck(&stuck);
        }

        let report = self.report(outcome);
        self.observer.run_finished(&report);
        Ok(report)
    }

    fn next_ready_index(&self) -> Option<usize> {
        let job = next_ready(&self.jobs, &self.succeeded)?;
        self.index.get(&job.name).copied()
    }

    /// Hand one ready job to the backend. Returns `Ok(true)` if it is now in
    /// flight, `Ok(false)` if it failed to start.
    async fn admit(&mut self, idx: usize) -> Result<bool> {
        let job = &self.jobs[idx];
        let dependency_handles = job
            .depends_on
            .iter()
            .filter_map(|dep| self.index.get(dep))
            .filter_map(|&dep_idx| self.jobs[dep_idx].handle.clone())
            .collect();

        let request = SubmitRequest {
            name: job.name.clone(),
            runnable: job.runnable.clone(),
            working_dir: job.working_dir.clone(),
            dependency_handles,
        };

        let result = self.backend.submit(request).await;
        let job = &mut self.jobs[idx];

        match result {
            Ok(SubmitOutcome::Started(handle)) => {
                job.mark_running(handle.clone());
                self.in_flight.insert(idx, handle);
                self.observer.job_started(job);
                Ok(true)
            }
            Ok(SubmitOutcome::StartFailed(reason)) => {
                job.error = Some(reason);
                job.mark_finished(JobStatus::Failed);
                self.observer.job_start_failed(job);
                Ok(false)
            }
            Err(err) => {
                job.error = Some(err.to_string());
                job.mark_finished(JobStatus::Failed);
                self.observer.job_start_failed(job);
                Err(err)
            }
        }
    }
}
