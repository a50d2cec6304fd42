use crate::scheduling::JobStatus;
use crate::types::{JobId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: JobId },

    #[error("Scheduled time {scheduled_time} must be later than {now}")]
    InvalidSchedule {
        scheduled_time: Timestamp,
        now: Timestamp,
    },

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Upstream service unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
