use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jobflow::backend::{
    BackendFuture, ExecutionBackend, JobCompletion, PollStatus, SubmitOutcome, SubmitRequest,
};
use jobflow::errors::{JobflowError, Result};
use jobflow::job::{JobHandle, JobName};

/// What the fake backend does with a job of a given name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behaviour {
    /// Report `StillRunning` for `polls` polls, then succeed.
    Succeed { polls: u32 },
    /// Report `StillRunning` for `polls` polls, then fail with `code`.
    Fail { polls: u32, code: i32 },
    /// `SubmitOutcome::StartFailed`: the job never runs.
    StartFail,
    /// Hard submission error, like a rejected batch submission.
    Reject,
    /// Report `Unknown` for `polls` polls, then succeed.
    Unknown { polls: u32 },
    /// Never reaches a terminal state.
    NeverFinish,
}

/// One accepted or attempted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub name: JobName,
    pub dependency_handles: Vec<JobHandle>,
}

/// Everything the fake saw, shared with the test through an `Arc`.
#[derive(Debug, Default)]
pub struct FakeLog {
    pub submissions: Vec<Submission>,
    /// Jobs started and not yet reported terminal.
    pub live: usize,
    /// Highest value `live` ever reached.
    pub max_live: usize,
    pub polls: usize,
}

impl FakeLog {
    pub fn submitted_names(&self) -> Vec<String> {
        self.submissions.iter().map(|s| s.name.clone()).collect()
    }
}

struct FakeJob {
    behaviour: Behaviour,
    polls_left: u32,
    finished: Option<JobCompletion>,
}

/// A scripted `ExecutionBackend`:
/// - each job name maps to a [`Behaviour`] (default: succeed on first poll)
/// - handles are `fake-1`, `fake-2`, ... in submission order
/// - terminal results are cached, so repeated polls give the same answer
/// - polls can be slowed down with [`FakeBackend::with_poll_delay`].
pub struct FakeBackend {
    behaviours: HashMap<JobName, Behaviour>,
    default_behaviour: Behaviour,
    jobs: HashMap<JobHandle, FakeJob>,
    next_id: u64,
    poll_delay: Duration,
    log: Arc<Mutex<FakeLog>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            default_behaviour: Behaviour::Succeed { polls: 0 },
            jobs: HashMap::new(),
            next_id: 0,
            poll_delay: Duration::ZERO,
            log: Arc::new(Mutex::new(FakeLog::default())),
        }
    }

    pub fn with(mut self, name: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(name.to_string(), behaviour);
        self
    }

    pub fn with_default(mut self, behaviour: Behaviour) -> Self {
        self.default_behaviour = behaviour;
        self
    }

    /// Make every status query take `delay`, like a slow `sacct`.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    /// Shared log; clone it before handing the backend to a scheduler.
    pub fn log(&self) -> Arc<Mutex<FakeLog>> {
        Arc::clone(&self.log)
    }

    fn behaviour_for(&self, name: &str) -> Behaviour {
        self.behaviours
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.default_behaviour.clone())
    }

    fn check(&mut self, handle: &JobHandle) -> PollStatus {
        self.log.lock().unwrap().polls += 1;

        let Some(job) = self.jobs.get_mut(handle) else {
            return PollStatus::Terminal(JobCompletion::failed(format!(
                "unknown handle {handle}"
            )));
        };

        if let Some(done) = &job.finished {
            return PollStatus::Terminal(done.clone());
        }

        if job.polls_left > 0 {
            job.polls_left -= 1;
            return match job.behaviour {
                Behaviour::Unknown { .. } => PollStatus::Unknown("status tool flaked".to_string()),
                _ => PollStatus::StillRunning,
            };
        }

        let completion = match job.behaviour {
            Behaviour::Succeed { .. } | Behaviour::Unknown { .. } => JobCompletion::from_exit_code(0),
            Behaviour::Fail { code, .. } => JobCompletion::from_exit_code(code),
            Behaviour::NeverFinish => return PollStatus::StillRunning,
            Behaviour::StartFail | Behaviour::Reject => {
                JobCompletion::failed("job should never have started")
            }
        };

        job.finished = Some(completion.clone());
        self.log.lock().unwrap().live -= 1;
        PollStatus::Terminal(completion)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(1)
    }

    fn submit(&mut self, request: SubmitRequest) -> BackendFuture<'_, Result<SubmitOutcome>> {
        Box::pin(async move {
            let behaviour = self.behaviour_for(&request.name);

            self.log.lock().unwrap().submissions.push(Submission {
                name: request.name.clone(),
                dependency_handles: request.dependency_handles.clone(),
            });

            let polls_left = match behaviour {
                Behaviour::Reject => {
                    return Err(JobflowError::Submission {
                        job: request.name,
                        message: "rejected by fake backend".to_string(),
                    });
                }
                Behaviour::StartFail => {
                    return Ok(SubmitOutcome::StartFailed(
                        "fake backend refused to start".to_string(),
                    ));
                }
                Behaviour::Succeed { polls }
                | Behaviour::Fail { polls, .. }
                | Behaviour::Unknown { polls } => polls,
                Behaviour::NeverFinish => 0,
            };

            self.next_id += 1;
            let handle = JobHandle::new(format!("fake-{}", self.next_id));
            self.jobs.insert(
                handle.clone(),
                FakeJob {
                    behaviour,
                    polls_left,
                    finished: None,
                },
            );

            {
                let mut log = self.log.lock().unwrap();
                log.live += 1;
                log.max_live = log.max_live.max(log.live);
            }

            Ok(SubmitOutcome::Started(handle))
        })
    }

    fn poll<'a>(&'a mut self, handle: &'a JobHandle) -> BackendFuture<'a, PollStatus> {
        Box::pin(async move {
            if !self.poll_delay.is_zero() {
                tokio::time::sleep(self.poll_delay).await;
            }
            self.check(handle)
        })
    }
}
