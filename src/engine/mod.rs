// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the completion poller (in-flight handles -> terminal records)
//! - the scheduler loop (poll, admit up to the concurrency ceiling, wait)
//! - the observer hook the loop reports transitions through
//! - the final run report
//!
//! The loop is a single cooperative task: the only suspension points are the
//! idle wait between ticks and the backend's submit/poll futures.

pub mod observer;
pub mod poller;
pub mod report;
pub mod scheduler;
pub mod tick;

pub use observer::{JobObserver, NoopObserver, TracingObserver};
pub use report::{JobSummary, RunOutcome, RunReport};
pub use scheduler::{Scheduler, SchedulerOptions};
pub use tick::TickSummary;
pub use crate::types::StuckPolicy;
