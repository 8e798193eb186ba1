// src/backend/local.rs

//! Local-process backend.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{
    BackendFuture, ExecutionBackend, JobCompletion, PollStatus, SubmitOutcome, SubmitRequest,
};
use crate::errors::Result;
use crate::job::{JobHandle, JobOutput, Runnable};

/// Tick interval for local jobs; polling a child is cheap.
pub const LOCAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long after a child exits its pipes may stay open before the output is
/// cut off. A background process started by the job (`cmd &`) inherits the
/// pipes and can hold them open indefinitely.
pub const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Background task copying one child pipe into a shared buffer.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(mut pipe: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut guard) => guard.extend_from_slice(&chunk[..n]),
                        Err(_) => break,
                    },
                    Err(err) => {
                        debug!(error = %err, "reading child pipe failed");
                        break;
                    }
                }
            }
        });
        Self { buf, task }
    }

    fn is_closed(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop reading and return whatever has arrived so far.
    fn take(self) -> String {
        self.task.abort();
        let bytes = match self.buf.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn take_pipe(reader: Option<PipeReader>) -> String {
    reader.map(PipeReader::take).unwrap_or_default()
}

/// A child process we started, plus the tasks draining its pipes.
struct LocalProcess {
    job: String,
    child: Child,
    stdout: Option<PipeReader>,
    stderr: Option<PipeReader>,
    /// Exit code and the moment the exit was first observed.
    exited: Option<(i32, Instant)>,
    /// Cached terminal result, so repeated polls are idempotent.
    finished: Option<JobCompletion>,
}

impl LocalProcess {
    fn pipes_closed(&self) -> bool {
        self.stdout.as_ref().is_none_or(PipeReader::is_closed)
            && self.stderr.as_ref().is_none_or(PipeReader::is_closed)
    }

    fn take_output(&mut self) -> JobOutput {
        JobOutput {
            stdout: take_pipe(self.stdout.take()),
            stderr: take_pipe(self.stderr.take()),
        }
    }
}

/// Runs each job as `sh -c <command>` (or `sh <script>`) in the job's working
/// directory, capturing stdout and stderr.
///
/// Handles are process ids. Polling never waits: a job whose process has
/// exited is reported finished once its pipes close, or after
/// [`OUTPUT_DRAIN_GRACE`] with the output read so far.
#[derive(Default)]
pub struct LocalBackend {
    processes: HashMap<JobHandle, LocalProcess>,
    /// Fallback handle source for the rare case where the OS reports no pid.
    next_anonymous: u64,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of processes started that have not been observed as finished.
    pub fn live_processes(&self) -> usize {
        self.processes
            .values()
            .filter(|p| p.finished.is_none())
            .count()
    }

    fn build_command(request: &SubmitRequest) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            match &request.runnable {
                Runnable::Command { command } => c.arg("/C").arg(command),
                Runnable::Script { path, .. } => c.arg("/C").arg(path),
            };
            c
        } else {
            let mut c = Command::new("sh");
            match &request.runnable {
                Runnable::Command { command } => c.arg("-c").arg(command),
                Runnable::Script { path, .. } => c.arg(path),
            };
            c
        };

        cmd.current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn start(&mut self, request: SubmitRequest) -> SubmitOutcome {
        info!(
            job = %request.name,
            runnable = %request.runnable,
            working_dir = %request.working_dir.display(),
            "starting local process"
        );

        let mut child = match Self::build_command(&request).spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(job = %request.name, error = %err, "failed to start local process");
                return SubmitOutcome::StartFailed(format!(
                    "spawning process for job '{}' in '{}': {}",
                    request.name,
                    request.working_dir.display(),
                    err
                ));
            }
        };

        let stdout = child.stdout.take().map(PipeReader::spawn);
        let stderr = child.stderr.take().map(PipeReader::spawn);

        let handle = match child.id() {
            Some(pid) => JobHandle::new(pid.to_string()),
            None => {
                self.next_anonymous += 1;
                JobHandle::new(format!("local-{}", self.next_anonymous))
            }
        };

        debug!(job = %request.name, handle = %handle, "local process started");

        self.processes.insert(
            handle.clone(),
            LocalProcess {
                job: request.name,
                child,
                stdout,
                stderr,
                exited: None,
                finished: None,
            },
        );

        SubmitOutcome::Started(handle)
    }

    fn check(&mut self, handle: &JobHandle) -> PollStatus {
        let Some(process) = self.processes.get_mut(handle) else {
            return PollStatus::Terminal(JobCompletion::failed(format!(
                "no local process for handle {handle}"
            )));
        };

        if let Some(done) = &process.finished {
            return PollStatus::Terminal(done.clone());
        }

        let (code, exited_at) = match process.exited {
            Some(exit) => exit,
            None => match process.child.try_wait() {
                Ok(None) => return PollStatus::StillRunning,
                Ok(Some(status)) => {
                    let code = status.code().unwrap_or(-1);
                    debug!(
                        job = %process.job,
                        handle = %handle,
                        exit_code = code,
                        success = status.success(),
                        "local process exited"
                    );
                    let exit = (code, Instant::now());
                    process.exited = Some(exit);
                    exit
                }
                Err(err) => {
                    warn!(job = %process.job, handle = %handle, error = %err, "querying local process failed");
                    let done = JobCompletion::failed(format!("querying process {handle}: {err}"))
                        .with_output(process.take_output());
                    process.finished = Some(done.clone());
                    return PollStatus::Terminal(done);
                }
            },
        };

        if !process.pipes_closed() {
            if exited_at.elapsed() < OUTPUT_DRAIN_GRACE {
                return PollStatus::StillRunning;
            }
            warn!(
                job = %process.job,
                handle = %handle,
                "output pipes still held open by a background process; keeping partial output"
            );
        }

        let done = JobCompletion::from_exit_code(code).with_output(process.take_output());
        process.finished = Some(done.clone());
        PollStatus::Terminal(done)
    }
}

impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn default_poll_interval(&self) -> Duration {
        LOCAL_POLL_INTERVAL
    }

    fn submit(&mut self, request: SubmitRequest) -> BackendFuture<'_, Result<SubmitOutcome>> {
        Box::pin(async move { Ok(self.start(request)) })
    }

    fn poll<'a>(&'a mut self, handle: &'a JobHandle) -> BackendFuture<'a, PollStatus> {
        Box::pin(async move { self.check(handle) })
    }
}
