// src/cli.rs

//! CLI argument parsing using `clap`.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::types::{BackendKind, StuckPolicy, parse_duration};

/// Command-line arguments for `jobflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobflow",
    version,
    about = "Run a set of dependent jobs locally or through a batch queue.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jobflow.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Override `[config].backend` (local or queue).
    #[arg(long, value_name = "KIND")]
    pub backend: Option<BackendKind>,

    /// Override `[config].max_concurrent_jobs`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,

    /// Override `[config].stuck_policy` (wait or exit).
    #[arg(long, value_name = "POLICY")]
    pub stuck_policy: Option<StuckPolicy>,

    /// Cancel the run after this long (e.g. `30m`, `2h`).
    #[arg(long, value_name = "DUR", value_parser = parse_duration)]
    pub deadline: Option<Duration>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the job list, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse() {
        let args = CliArgs::try_parse_from([
            "jobflow",
            "--config",
            "runs/Jobflow.toml",
            "--backend",
            "slurm",
            "--max-concurrent",
            "4",
            "--stuck-policy",
            "exit",
            "--deadline",
            "90s",
        ])
        .unwrap();

        assert_eq!(args.config, "runs/Jobflow.toml");
        assert_eq!(args.backend, Some(BackendKind::Queue));
        assert_eq!(args.max_concurrent, Some(4));
        assert_eq!(args.stuck_policy, Some(StuckPolicy::Exit));
        assert_eq!(args.deadline, Some(Duration::from_secs(90)));
        assert!(!args.dry_run);
    }

    #[test]
    fn config_defaults_to_the_standard_file_name() {
        let args = CliArgs::try_parse_from(["jobflow"]).unwrap();
        assert_eq!(args.config, DEFAULT_CONFIG_FILE);
        assert_eq!(args.config, "Jobflow.toml");
        assert!(args.backend.is_none());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        assert!(CliArgs::try_parse_from(["jobflow", "--max-concurrent", "0"]).is_err());
    }
}
