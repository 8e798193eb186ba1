// tests/scheduler_property.rs

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use proptest::prelude::*;

use jobflow::engine::{RunOutcome, Scheduler, SchedulerOptions, StuckPolicy};
use jobflow::job::{JobSpec, JobStatus};
use jobflow_test_utils::fake_backend::{Behaviour, FakeBackend};

/// One generated job: dependency indices (always lower than its own index,
/// so the graph is acyclic), how many polls it runs for, and whether it fails.
#[derive(Debug, Clone)]
struct GenJob {
    deps: Vec<usize>,
    polls: u32,
    fails: bool,
}

fn jobs_strategy(max_jobs: usize) -> impl Strategy<Value = Vec<GenJob>> {
    proptest::collection::vec(
        (
            proptest::collection::vec(any::<usize>(), 0..3),
            0..4u32,
            proptest::bool::weighted(0.15),
        ),
        1..=max_jobs,
    )
    .prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (potential, polls, fails))| {
                // Sanitize dependencies: only allow deps < i
                let deps: HashSet<usize> = if i == 0 {
                    HashSet::new()
                } else {
                    potential.into_iter().map(|d| d % i).collect()
                };
                GenJob {
                    deps: deps.into_iter().collect(),
                    polls,
                    fails,
                }
            })
            .collect()
    })
}

fn name(i: usize) -> String {
    format!("job_{i}")
}

struct Outcome {
    statuses: Vec<JobStatus>,
    submitted: Vec<String>,
    max_live: usize,
    outcome: RunOutcome,
}

fn run(jobs: &[GenJob], max_concurrent: usize) -> Outcome {
    let mut backend = FakeBackend::new();
    for (i, job) in jobs.iter().enumerate() {
        let behaviour = if job.fails {
            Behaviour::Fail {
                polls: job.polls,
                code: 1,
            }
        } else {
            Behaviour::Succeed { polls: job.polls }
        };
        backend = backend.with(&name(i), behaviour);
    }
    let log = backend.log();

    let options = SchedulerOptions {
        max_concurrent_jobs: max_concurrent,
        poll_interval: Some(Duration::from_millis(0)),
        stuck_policy: StuckPolicy::Exit,
    };
    let mut scheduler = Scheduler::new(backend, options);
    for (i, job) in jobs.iter().enumerate() {
        let deps: Vec<String> = job.deps.iter().map(|&d| name(d)).collect();
        scheduler
            .add_job(JobSpec::command(name(i), "true").depends_on(deps))
            .unwrap();
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let report = rt.block_on(scheduler.run_jobs()).unwrap();

    let log = log.lock().unwrap();
    Outcome {
        statuses: report.jobs.iter().map(|j| j.status).collect(),
        submitted: log.submitted_names(),
        max_live: log.max_live,
        outcome: report.outcome,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrency_ceiling_and_dependency_order_hold(
        jobs in jobs_strategy(12),
        max_concurrent in 1..4usize,
    ) {
        let result = run(&jobs, max_concurrent);

        prop_assert!(result.max_live <= max_concurrent);
        prop_assert!(matches!(result.outcome, RunOutcome::Drained | RunOutcome::Stuck));

        let status: HashMap<String, JobStatus> = (0..jobs.len())
            .map(name)
            .zip(result.statuses.iter().copied())
            .collect();

        for (i, job) in jobs.iter().enumerate() {
            let me = status[&name(i)];
            let deps_ok = job.deps.iter().all(|&d| status[&name(d)] == JobStatus::Succeeded);

            // Nothing is left running once the loop returns.
            prop_assert_ne!(me, JobStatus::Running);

            if deps_ok {
                // Ready jobs always get their turn.
                prop_assert!(me.is_terminal());
            } else {
                // A job never runs unless all its dependencies succeeded.
                prop_assert_eq!(me, JobStatus::Pending);
            }

            if let Some(pos) = result.submitted.iter().position(|n| *n == name(i)) {
                for &d in &job.deps {
                    let dep_pos = result.submitted.iter().position(|n| *n == name(d));
                    prop_assert!(matches!(dep_pos, Some(p) if p < pos));
                }
            }
        }

        // Each job is submitted at most once.
        let unique: HashSet<&String> = result.submitted.iter().collect();
        prop_assert_eq!(unique.len(), result.submitted.len());
    }

    #[test]
    fn identical_inputs_give_identical_runs(
        jobs in jobs_strategy(10),
        max_concurrent in 1..4usize,
    ) {
        let a = run(&jobs, max_concurrent);
        let b = run(&jobs, max_concurrent);
        prop_assert_eq!(a.submitted, b.submitted);
        prop_assert_eq!(a.statuses, b.statuses);
    }
}
