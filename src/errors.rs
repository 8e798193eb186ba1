// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in job graph: {0}")]
    DagCycle(String),

    /// A job with this name was already registered on the scheduler.
    #[error("Duplicate job name: {0}")]
    DuplicateJob(String),

    /// A job description that can never be scheduled as written
    /// (empty name, self dependency, ...).
    #[error("Invalid job '{job}': {reason}")]
    InvalidJob { job: String, reason: String },

    /// The execution backend refused to accept the job.
    ///
    /// Only raised by backends whose submission is synchronous and has no
    /// handle to track afterwards (the external queue).
    #[error("Submission of job '{job}' failed: {message}")]
    Submission { job: String, message: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobflowError {
    pub(crate) fn invalid_job(job: impl Into<String>, reason: impl Into<String>) -> Self {
        JobflowError::InvalidJob {
            job: job.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobflowError>;
