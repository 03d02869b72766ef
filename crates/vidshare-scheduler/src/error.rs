//! Scheduler error types.

use thiserror::Error;

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is shut down")]
    ShutDown,
}
