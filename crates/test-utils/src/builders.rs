//! Builders for config structs, so tests do not spell out every field.

use std::path::PathBuf;

use jobflow::config::{ConfigFile, ConfigSection, JobConfig, QueueSection, RawConfigFile};
use jobflow::job::{DependencySet, QueueParams};
use jobflow::types::{BackendKind, StuckPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                queue: QueueSection::default(),
                job: Vec::new(),
            },
        }
    }

    pub fn with_job(mut self, job: JobConfig) -> Self {
        self.config.job.push(job);
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.config.backend = backend;
        self
    }

    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.config.config.max_concurrent_jobs = max;
        self
    }

    pub fn stuck_policy(mut self, policy: StuckPolicy) -> Self {
        self.config.config.stuck_policy = policy;
        self
    }

    pub fn poll_interval(mut self, interval: &str) -> Self {
        self.config.config.poll_interval = Some(interval.to_string());
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    fn empty(name: &str) -> Self {
        Self {
            job: JobConfig {
                name: name.to_string(),
                cmd: None,
                script: None,
                working_dir: None,
                depends_on: DependencySet::new(),
                params: QueueParams::default(),
            },
        }
    }

    pub fn cmd(name: &str, cmd: &str) -> Self {
        let mut b = Self::empty(name);
        b.job.cmd = Some(cmd.to_string());
        b
    }

    pub fn script(name: &str, path: &str) -> Self {
        let mut b = Self::empty(name);
        b.job.script = Some(PathBuf::from(path));
        b
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.job.depends_on.insert(dep);
        self
    }

    pub fn partition(mut self, partition: &str) -> Self {
        self.job.params.partition = Some(partition.to_string());
        self
    }

    pub fn ntasks(mut self, n: u32) -> Self {
        self.job.params.ntasks = Some(n);
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
