// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backend::QueueConfig;
use crate::engine::SchedulerOptions;
use crate::job::{DependencySet, JobSpec, QueueParams, Runnable};
use crate::types::{BackendKind, StuckPolicy};

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// backend = "local"
/// max_concurrent_jobs = 2
///
/// [queue]
/// partition = "cpu"
/// memory = "2G"
///
/// [[job]]
/// name = "minimization"
/// cmd = "lmp -in in.min"
///
/// [[job]]
/// name = "equilibration"
/// cmd = "lmp -in in.equ"
/// depends_on = "minimization"
/// ```
///
/// Jobs are an array of tables so their order in the file is their
/// registration order.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub job: Vec<JobConfig>,
}

/// A validated configuration.
///
/// Obtain one through [`crate::config::load_and_validate`] or
/// `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub queue: QueueSection,
    pub job: Vec<JobConfig>,
    poll_interval: Option<Duration>,
    deadline: Option<Duration>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        raw: RawConfigFile,
        poll_interval: Option<Duration>,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            config: raw.config,
            queue: raw.queue,
            job: raw.job,
            poll_interval,
            deadline,
        }
    }

    /// Parsed `[config].poll_interval`.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// Parsed `[config].deadline`.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_concurrent_jobs: self.config.max_concurrent_jobs,
            poll_interval: self.poll_interval,
            stuck_policy: self.config.stuck_policy,
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            submit_program: self.queue.submit_program.clone(),
            status_program: self.queue.status_program.clone(),
            log_dir: self.queue.log_dir.clone(),
            defaults: self.queue.defaults.clone(),
        }
    }

    /// Job specs in file order, with relative working directories resolved
    /// against `root`.
    pub fn job_specs(&self, root: &Path) -> Vec<JobSpec> {
        self.job.iter().map(|j| j.to_spec(root)).collect()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub backend: BackendKind,

    /// Upper bound on simultaneously running jobs.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Idle wait between ticks, e.g. `"1s"`. Defaults per backend
    /// (1s local, 10s queue).
    #[serde(default)]
    pub poll_interval: Option<String>,

    #[serde(default)]
    pub stuck_policy: StuckPolicy,

    /// Stop the run after this long, leaving unfinished jobs as they are.
    #[serde(default)]
    pub deadline: Option<String>,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            poll_interval: None,
            stuck_policy: StuckPolicy::default(),
            deadline: None,
        }
    }
}

/// `[queue]` section: how to reach the batch queue plus default job
/// parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    #[serde(default = "default_submit_program")]
    pub submit_program: String,

    #[serde(default = "default_status_program")]
    pub status_program: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// `partition`, `memory`, `time_limit`, ... applied to every queue job.
    #[serde(flatten)]
    pub defaults: QueueParams,
}

fn default_submit_program() -> String {
    "sbatch".to_string()
}

fn default_status_program() -> String {
    "sacct".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("slurm_logs")
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            submit_program: default_submit_program(),
            status_program: default_status_program(),
            log_dir: default_log_dir(),
            defaults: QueueParams::default(),
        }
    }
}

/// One `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,

    /// Shell command. Exactly one of `cmd` / `script` must be set.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Batch script path.
    #[serde(default)]
    pub script: Option<PathBuf>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// `depends_on = "A"` or `depends_on = ["A", "B"]`.
    #[serde(default)]
    pub depends_on: DependencySet,

    /// Per-job queue parameters; only meaningful with `script`.
    #[serde(flatten)]
    pub params: QueueParams,
}

impl JobConfig {
    /// Convert to a [`JobSpec`]. Assumes the entry has been validated.
    pub fn to_spec(&self, root: &Path) -> JobSpec {
        let runnable = match (&self.cmd, &self.script) {
            (_, Some(script)) => Runnable::script(script.clone(), self.params.clone()),
            (Some(cmd), None) => Runnable::command(cmd.clone()),
            (None, None) => Runnable::command(String::new()),
        };

        let working_dir = match &self.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => root.to_path_buf(),
        };

        JobSpec::new(self.name.clone(), runnable)
            .working_dir(working_dir)
            .depends_on(self.depends_on.clone())
    }
}
