// src/job/mod.rs

//! Job data model and the pure scheduling rules around it.
//!
//! - [`record`] holds the per-job record and the registration spec.
//! - [`runnable`] describes what a job runs and its queue parameters.
//! - [`depends`] normalises "one name or many" into a dependency set.
//! - [`readiness`] decides which pending job may run next and which are stuck.
//! - [`admission`] enforces the concurrency ceiling.

pub mod admission;
pub mod depends;
pub mod readiness;
pub mod record;
pub mod runnable;

/// Canonical job name type used throughout the engine.
pub type JobName = String;

pub use admission::can_admit;
pub use depends::DependencySet;
pub use readiness::{is_ready, next_ready, stuck_reason, stuck_reasons, StuckReason};
pub use record::{JobHandle, JobOutput, JobRecord, JobSpec, JobStatus};
pub use runnable::{QueueParams, Runnable};
