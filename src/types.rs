use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Which execution backend dispatches the jobs.
///
/// - `Local`: each job is a child process on this machine.
/// - `Queue`: each job is submitted to an external batch queue
///   (`sbatch`-compatible) and polled through its status tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Queue,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "queue" | "slurm" => Ok(BackendKind::Queue),
            other => Err(format!(
                "invalid backend: {other} (expected \"local\" or \"queue\")"
            )),
        }
    }
}

/// What the scheduler loop does once the only jobs left are ones that can
/// never become ready (a dependency failed, was never registered, or sits on
/// a cycle).
///
/// - `Wait` (default): keep ticking until the caller's shutdown signal fires.
///   Stuck jobs stay `Pending`.
/// - `Exit`: stop as soon as nothing is in flight and no pending job is ready,
///   returning a report that lists the stuck jobs. They still stay `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StuckPolicy {
    #[default]
    Wait,
    Exit,
}

impl FromStr for StuckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wait" => Ok(StuckPolicy::Wait),
            "exit" => Ok(StuckPolicy::Exit),
            other => Err(format!(
                "invalid stuck_policy: {other} (expected \"wait\" or \"exit\")"
            )),
        }
    }
}

/// Parse a duration string like `"500ms"`, `"10s"`, `"5m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration(" 5m "), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("3d").is_err());
    }

    #[test]
    fn backend_and_policy_from_str() {
        assert_eq!("LOCAL".parse::<BackendKind>(), Ok(BackendKind::Local));
        assert_eq!("slurm".parse::<BackendKind>(), Ok(BackendKind::Queue));
        assert!("k8s".parse::<BackendKind>().is_err());
        assert_eq!("exit".parse::<StuckPolicy>(), Ok(StuckPolicy::Exit));
        assert!("retry".parse::<StuckPolicy>().is_err());
    }
}
