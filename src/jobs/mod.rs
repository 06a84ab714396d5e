//! Background jobs.
//!
//! Long-running drivers for work that is queued rather than done inline.

pub mod user_deletion;

pub use user_deletion::{DeletionWorker, WorkerStats};
