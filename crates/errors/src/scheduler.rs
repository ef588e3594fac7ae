//! Scheduler error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A pipeline task panicked or was aborted out from under the scheduler.
    #[error("pipeline task failed: {message}")]
    TaskFailed { message: String },
}
