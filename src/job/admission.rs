// src/job/admission.rs

//! Concurrency ceiling for in-flight jobs.

/// Whether one more job may be started given the current in-flight count.
pub fn can_admit(in_flight_count: usize, max_concurrent: usize) -> bool {
    in_flight_count < max_concurrent
}
