// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::config::model::{ConfigFile, JobConfig, RawConfigFile};
use crate::errors::{JobflowError, Result};
use crate::job::QueueParams;
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let poll_interval = parse_optional_duration("poll_interval", &raw.config.poll_interval)?;
        let deadline = parse_optional_duration("deadline", &raw.config.deadline)?;
        Ok(ConfigFile::new_unchecked(raw, poll_interval, deadline))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_global_config(cfg)?;
    validate_jobs(cfg)?;
    validate_job_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(JobflowError::ConfigError(
            "config must contain at least one [[job]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_concurrent_jobs == 0 {
        return Err(JobflowError::ConfigError(
            "[config].max_concurrent_jobs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn parse_optional_duration(field: &str, value: &Option<String>) -> Result<Option<Duration>> {
    match value {
        None => Ok(None),
        Some(s) => parse_duration(s)
            .map(Some)
            .map_err(|e| JobflowError::ConfigError(format!("[config].{field}: {e}"))),
    }
}

fn validate_jobs(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for job in cfg.job.iter() {
        if job.name.trim().is_empty() {
            return Err(JobflowError::ConfigError(
                "every [[job]] needs a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(job.name.as_str()) {
            return Err(JobflowError::ConfigError(format!(
                "job '{}' is defined more than once",
                job.name
            )));
        }
        validate_runnable(job)?;
    }
    Ok(())
}

fn validate_runnable(job: &JobConfig) -> Result<()> {
    match (&job.cmd, &job.script) {
        (Some(_), Some(_)) => Err(JobflowError::ConfigError(format!(
            "job '{}' sets both `cmd` and `script`; pick one",
            job.name
        ))),
        (None, None) => Err(JobflowError::ConfigError(format!(
            "job '{}' needs either `cmd` or `script`",
            job.name
        ))),
        (Some(_), None) if job.params != QueueParams::default() => {
            Err(JobflowError::ConfigError(format!(
                "job '{}' sets queue parameters but has no `script`",
                job.name
            )))
        }
        _ => Ok(()),
    }
}

fn validate_job_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.job.iter().map(|j| j.name.as_str()).collect();

    for job in cfg.job.iter() {
        for dep in job.depends_on.iter() {
            if dep == job.name {
                return Err(JobflowError::ConfigError(format!(
                    "job '{}' cannot depend on itself in `depends_on`",
                    job.name
                )));
            }
            if !names.contains(dep) {
                // Allowed: the job simply never becomes ready.
                warn!(
                    job = %job.name,
                    dep,
                    "job depends on an undefined job and will never run"
                );
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for job in cfg.job.iter() {
        graph.add_node(job.name.as_str());
    }

    for job in cfg.job.iter() {
        for dep in job.depends_on.iter() {
            if graph.contains_node(dep) {
                graph.add_edge(dep, job.name.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(JobflowError::DagCycle(format!(
                "cycle detected in job graph involving job '{}'",
                node
            )))
        }
    }
}
