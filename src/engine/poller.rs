// src/engine/poller.rs

//! Completion poller: resolves in-flight handles into terminal job states.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::backend::{ExecutionBackend, PollStatus};
use crate::engine::observer::JobObserver;
use crate::job::{JobHandle, JobName, JobRecord, JobStatus};

/// Poll every in-flight job once.
///
/// `in_flight` maps a job's registration index to its backend handle. For
/// each handle the backend reports terminal, the record is finalised, the
/// name joins `succeeded` (on success only) and the observer is told. All
/// resolved entries are removed after the pass.
///
/// Returns the names of jobs that finished, in registration order.
pub async fn poll_in_flight<B>(
    backend: &mut B,
    jobs: &mut [JobRecord],
    in_flight: &mut BTreeMap<usize, JobHandle>,
    succeeded: &mut HashSet<JobName>,
    observer: &mut dyn JobObserver,
) -> Vec<JobName>
where
    B: ExecutionBackend + ?Sized,
{
    let mut resolved = Vec::new();
    let mut finished = Vec::new();

    for (&idx, handle) in in_flight.iter() {
        let job = &mut jobs[idx];

        match backend.poll(handle).await {
            PollStatus::StillRunning => {}
            PollStatus::Unknown(reason) => observer.poll_unknown(job, &reason),
            PollStatus::Terminal(done) => {
                if !job.mark_finished(done.status) {
                    debug!(job = %job.name, "terminal result for already-finished job ignored");
                    resolved.push(idx);
                    continue;
                }
                job.exit_code = done.exit_code;
                job.output = done.output;
                job.error = done.error;

                if job.status == JobStatus::Succeeded {
                    succeeded.insert(job.name.clone());
                }
                observer.job_finished(job);
                finished.push(job.name.clone());
                resolved.push(idx);
            }
        }
    }

    for idx in resolved {
        in_flight.remove(&idx);
    }

    finished
}
