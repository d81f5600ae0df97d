//! Scheduler (C11): the periodic duty cycles that wire derivation, external
//! metric collection, rating, and anomaly detection into one running
//! process (spec §4.11). This crate is the only one with a binary entry
//! point; the others are pure libraries.

pub mod backoff;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod scheduler;

pub use backoff::{retry_with_backoff, DEFAULT_DELAYS};
pub use error::SchedulerError;
pub use pipeline::Pipeline;
pub use policy::{InMemoryPolicyDirectory, PolicyDirectory};
pub use scheduler::{CycleReport, Scheduler};
