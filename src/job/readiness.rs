// src/job/readiness.rs

//! Dependency evaluation.
//!
//! Everything here is a pure function over the current job records and the
//! set of names that have succeeded so far. The scheduler re-evaluates on
//! every tick because the succeeded set only ever grows.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::job::{JobName, JobRecord, JobStatus};

/// Whether every dependency of `job` has succeeded.
///
/// A job with no dependencies is always ready.
pub fn is_ready(job: &JobRecord, succeeded: &HashSet<JobName>) -> bool {
    job.depends_on.iter().all(|dep| succeeded.contains(dep))
}

/// First `Pending` job, in registration order, whose dependencies are met.
///
/// Scan order is the only tie-break, which keeps scheduling reproducible for
/// identical registration sequences.
pub fn next_ready<'a>(
    jobs: &'a [JobRecord],
    succeeded: &HashSet<JobName>,
) -> Option<&'a JobRecord> {
    jobs.iter()
        .find(|job| job.status == JobStatus::Pending && is_ready(job, succeeded))
}

/// Why a pending job can never become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StuckReason {
    /// The named dependency (possibly transitive) ended `Failed`.
    FailedDependency(JobName),
    /// The named dependency was never registered.
    UnknownDependency(JobName),
    /// The named dependency is part of a dependency cycle.
    DependencyCycle(JobName),
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StuckReason::FailedDependency(dep) => write!(f, "dependency '{dep}' failed"),
            StuckReason::UnknownDependency(dep) => {
                write!(f, "dependency '{dep}' was never registered")
            }
            StuckReason::DependencyCycle(dep) => {
                write!(f, "dependency '{dep}' is part of a cycle")
            }
        }
    }
}

/// Classify `name` as permanently stuck, or `None` if it can still make
/// progress (or is not pending at all).
///
/// Pending dependencies are followed transitively; a dependency that is
/// `Running` or `Succeeded` never makes a job stuck.
pub fn stuck_reason(jobs: &[JobRecord], name: &str) -> Option<StuckReason> {
    let by_name = index_by_name(jobs);
    let job = *by_name.get(name)?;
    if job.status != JobStatus::Pending {
        return None;
    }
    classify(&by_name, job, &mut HashMap::new())
}

/// [`stuck_reason`] for every pending job at once.
///
/// Each job is classified a single time and the result shared by all of its
/// dependents, so the cost is linear in jobs plus dependency edges even for
/// heavily shared ancestors.
pub fn stuck_reasons(jobs: &[JobRecord]) -> HashMap<JobName, StuckReason> {
    let by_name = index_by_name(jobs);
    let mut marks = HashMap::new();

    jobs.iter()
        .filter(|job| job.status == JobStatus::Pending)
        .filter_map(|job| {
            classify(&by_name, job, &mut marks).map(|reason| (job.name.clone(), reason))
        })
        .collect()
}

/// DFS state of a pending job.
enum Mark {
    Visiting,
    Done(Option<StuckReason>),
}

fn index_by_name(jobs: &[JobRecord]) -> HashMap<&str, &JobRecord> {
    jobs.iter().map(|job| (job.name.as_str(), job)).collect()
}

fn classify<'a>(
    by_name: &HashMap<&'a str, &'a JobRecord>,
    job: &'a JobRecord,
    marks: &mut HashMap<&'a str, Mark>,
) -> Option<StuckReason> {
    if let Some(Mark::Done(reason)) = marks.get(job.name.as_str()) {
        return reason.clone();
    }

    marks.insert(job.name.as_str(), Mark::Visiting);
    let reason = job
        .depends_on
        .iter()
        .find_map(|dep| blocker(by_name, dep, marks));
    marks.insert(job.name.as_str(), Mark::Done(reason.clone()));
    reason
}

/// What `dep` contributes to its dependent being stuck.
fn blocker<'a>(
    by_name: &HashMap<&'a str, &'a JobRecord>,
    dep: &str,
    marks: &mut HashMap<&'a str, Mark>,
) -> Option<StuckReason> {
    let Some(&dep_job) = by_name.get(dep) else {
        return Some(StuckReason::UnknownDependency(dep.to_string()));
    };

    match dep_job.status {
        JobStatus::Failed => Some(StuckReason::FailedDependency(dep_job.name.clone())),
        JobStatus::Running | JobStatus::Succeeded => None,
        JobStatus::Pending => match marks.get(dep_job.name.as_str()) {
            Some(Mark::Visiting) => Some(StuckReason::DependencyCycle(dep_job.name.clone())),
            Some(Mark::Done(reason)) => reason.clone(),
            None => classify(by_name, dep_job, marks),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;

    fn record(name: &str, deps: &[&str], status: JobStatus) -> JobRecord {
        let mut rec = JobRecord::from_spec(
            JobSpec::command(name, "true").depends_on(deps.to_vec()),
        );
        rec.status = status;
        rec
    }

    fn names(list: &[&str]) -> HashSet<JobName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn job_without_dependencies_is_always_ready() {
        let job = record("A", &[], JobStatus::Pending);
        assert!(is_ready(&job, &HashSet::new()));
    }

    #[test]
    fn ready_only_when_every_dependency_succeeded() {
        let job = record("C", &["A", "B"], JobStatus::Pending);
        assert!(!is_ready(&job, &names(&["A"])));
        assert!(is_ready(&job, &names(&["A", "B"])));
    }

    #[test]
    fn next_ready_follows_registration_order() {
        let jobs = vec![
            record("A", &[], JobStatus::Running),
            record("B", &["A"], JobStatus::Pending),
            record("C", &[], JobStatus::Pending),
            record("D", &[], JobStatus::Pending),
        ];

        let next = next_ready(&jobs, &HashSet::new()).map(|j| j.name.as_str());
        assert_eq!(next, Some("C"));

        let next = next_ready(&jobs, &names(&["A"])).map(|j| j.name.as_str());
        assert_eq!(next, Some("B"));
    }

    #[test]
    fn next_ready_is_none_when_nothing_pending_is_ready() {
        let jobs = vec![
            record("A", &[], JobStatus::Failed),
            record("B", &["A"], JobStatus::Pending),
        ];
        assert!(next_ready(&jobs, &HashSet::new()).is_none());
    }

    #[test]
    fn stuck_reason_follows_failed_ancestors_transitively() {
        let jobs = vec![
            record("A", &[], JobStatus::Failed),
            record("B", &["A"], JobStatus::Pending),
            record("C", &["B"], JobStatus::Pending),
        ];
        assert_eq!(
            stuck_reason(&jobs, "C"),
            Some(StuckReason::FailedDependency("A".into()))
        );
    }

    #[test]
    fn stuck_reason_reports_unknown_and_cyclic_dependencies() {
        let jobs = vec![
            record("A", &["ghost"], JobStatus::Pending),
            record("B", &["C"], JobStatus::Pending),
            record("C", &["B"], JobStatus::Pending),
        ];
        assert_eq!(
            stuck_reason(&jobs, "A"),
            Some(StuckReason::UnknownDependency("ghost".into()))
        );
        assert!(matches!(
            stuck_reason(&jobs, "B"),
            Some(StuckReason::DependencyCycle(_))
        ));
    }

    #[test]
    fn jobs_waiting_on_live_dependencies_are_not_stuck() {
        let jobs = vec![
            record("A", &[], JobStatus::Running),
            record("B", &["A"], JobStatus::Pending),
            record("C", &["B"], JobStatus::Pending),
        ];
        assert_eq!(stuck_reason(&jobs, "C"), None);
        assert_eq!(stuck_reason(&jobs, "A"), None);
        assert_eq!(stuck_reason(&jobs, "missing"), None);
    }

    /// `layers` rows of `width` jobs; every job depends on the whole row
    /// above it, and the top row on `root`.
    fn layered(root_status: JobStatus, layers: usize, width: usize) -> Vec<JobRecord> {
        let mut jobs = vec![record("root", &[], root_status)];
        let mut above = vec!["root".to_string()];
        for layer in 0..layers {
            let row: Vec<String> = (0..width).map(|i| format!("L{layer}-{i}")).collect();
            for name in &row {
                let deps: Vec<&str> = above.iter().map(String::as_str).collect();
                jobs.push(record(name, &deps, JobStatus::Pending));
            }
            above = row;
        }
        jobs
    }

    #[test]
    fn stuck_reasons_covers_every_pending_job() {
        let jobs = vec![
            record("A", &[], JobStatus::Failed),
            record("B", &["A"], JobStatus::Pending),
            record("C", &["B", "ghost"], JobStatus::Pending),
            record("D", &["E"], JobStatus::Pending),
            record("E", &["D"], JobStatus::Pending),
            record("F", &[], JobStatus::Running),
            record("G", &["F"], JobStatus::Pending),
        ];

        let stuck = stuck_reasons(&jobs);
        assert_eq!(stuck.len(), 4);
        assert_eq!(stuck["B"], StuckReason::FailedDependency("A".into()));
        assert!(matches!(
            stuck["C"],
            StuckReason::FailedDependency(_) | StuckReason::UnknownDependency(_)
        ));
        assert!(matches!(stuck["D"], StuckReason::DependencyCycle(_)));
        assert!(matches!(stuck["E"], StuckReason::DependencyCycle(_)));
        assert!(!stuck.contains_key("G"));

        for name in ["B", "C", "D", "E", "G"] {
            assert_eq!(stuck_reason(&jobs, name), stuck.get(name).cloned(), "{name}");
        }
    }

    #[test]
    fn deep_diamond_layers_classify_quickly() {
        // Without sharing results between dependents this graph has 2^40
        // paths from the bottom row to the root.
        let live = layered(JobStatus::Running, 40, 2);
        let started = std::time::Instant::now();
        assert!(stuck_reasons(&live).is_empty());
        assert_eq!(stuck_reason(&live, "L39-0"), None);

        let failed = layered(JobStatus::Failed, 40, 2);
        let stuck = stuck_reasons(&failed);
        assert_eq!(stuck.len(), 80);
        assert!(
            stuck
                .values()
                .all(|r| *r == StuckReason::FailedDependency("root".into()))
        );
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
