// src/engine/tick.rs

//! Result type for a single scheduler tick.

use crate::job::JobName;

/// What changed during one pass of the scheduler loop.
///
/// Useful for tests that drive the loop tick by tick and assert on the exact
/// admission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Jobs the completion poller found terminal, in registration order.
    pub finished: Vec<JobName>,
    /// Jobs admitted and now in flight, in admission order.
    pub started: Vec<JobName>,
    /// Jobs the backend could not start (now `Failed`).
    pub start_failed: Vec<JobName>,
}

impl TickSummary {
    /// Whether any job changed state this tick.
    pub fn made_progress(&self) -> bool {
        !(self.finished.is_empty() && self.started.is_empty() && self.start_failed.is_empty())
    }
}
