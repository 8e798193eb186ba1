// src/job/runnable.rs

//! What a job actually runs.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

/// Opaque description of the work a job performs.
///
/// The engine never looks inside a `Runnable`; only backends do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runnable {
    /// A shell command line (`sh -c <command>` for the local backend,
    /// `--wrap` for the queue backend).
    Command { command: String },
    /// A batch script plus per-job queue parameters.
    Script { path: PathBuf, params: QueueParams },
}

impl Runnable {
    pub fn command(command: impl Into<String>) -> Self {
        Runnable::Command {
            command: command.into(),
        }
    }

    pub fn script(path: impl Into<PathBuf>, params: QueueParams) -> Self {
        Runnable::Script {
            path: path.into(),
            params,
        }
    }

    /// Queue parameters attached to this runnable, if any.
    pub fn queue_params(&self) -> Option<&QueueParams> {
        match self {
            Runnable::Command { .. } => None,
            Runnable::Script { params, .. } => Some(params),
        }
    }
}

impl fmt::Display for Runnable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runnable::Command { command } => write!(f, "{command}"),
            Runnable::Script { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

/// Resource request for a batch-queue job.
///
/// Every field is optional: job-level values override the defaults configured
/// on the queue backend (see [`QueueParams::merged_over`]), and fields still
/// unset after merging are simply not passed to the submission tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueueParams {
    /// Partition / queue name (`--partition`).
    #[serde(default)]
    pub partition: Option<String>,
    /// Memory request, e.g. `"2G"` (`--mem`).
    #[serde(default)]
    pub memory: Option<String>,
    /// Wall-clock limit, e.g. `"00:10:00"` (`--time`).
    #[serde(default)]
    pub time_limit: Option<String>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub ntasks: Option<u32>,
    #[serde(default)]
    pub cpus_per_task: Option<u32>,
    /// Quality-of-service name (`--qos`).
    #[serde(default)]
    pub qos: Option<String>,
}

impl QueueParams {
    /// Fill every unset field of `self` from `defaults`.
    pub fn merged_over(&self, defaults: &QueueParams) -> QueueParams {
        QueueParams {
            partition: self.partition.clone().or_else(|| defaults.partition.clone()),
            memory: self.memory.clone().or_else(|| defaults.memory.clone()),
            time_limit: self
                .time_limit
                .clone()
                .or_else(|| defaults.time_limit.clone()),
            nodes: self.nodes.or(defaults.nodes),
            ntasks: self.ntasks.or(defaults.ntasks),
            cpus_per_task: self.cpus_per_task.or(defaults.cpus_per_task),
            qos: self.qos.clone().or_else(|| defaults.qos.clone()),
        }
    }
}
