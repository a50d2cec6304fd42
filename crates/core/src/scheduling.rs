//! Job lifecycle and scheduling rules.
//!
//! Status flow: `pending -> running -> {completed | failed}`. Deletion is
//! allowed from any state and is not a transition.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Default job-list poll interval.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default price poll interval.
pub const PRICE_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Maximum accepted model name length.
pub const MAX_MODEL_NAME_LEN: usize = 200;
/// Maximum accepted input text length, in bytes.
pub const MAX_INPUT_TEXT_LEN: usize = 100_000;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown job status '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::JobStatus;
    use crate::error::CoreError;
    use crate::types::JobId;

    /// Statuses reachable from `from`. Terminal states return an empty slice.
    pub fn valid_transitions(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Pending => &[JobStatus::Running],
            JobStatus::Running => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// The status a job must be in before moving to `to`.
    pub fn required_source(to: JobStatus) -> Option<JobStatus> {
        match to {
            JobStatus::Running => Some(JobStatus::Pending),
            JobStatus::Completed | JobStatus::Failed => Some(JobStatus::Running),
            JobStatus::Pending => None,
        }
    }

    pub fn validate_transition(id: JobId, from: JobStatus, to: JobStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition { id, from, to })
        }
    }
}

// ---------------------------------------------------------------------------
// Creation rules
// ---------------------------------------------------------------------------

/// Reject a schedule that is not strictly in the future.
pub fn validate_schedule(scheduled_time: Timestamp, now: Timestamp) -> Result<(), CoreError> {
    if scheduled_time > now {
        Ok(())
    } else {
        Err(CoreError::InvalidSchedule {
            scheduled_time,
            now,
        })
    }
}

/// Model name must be non-blank and bounded; input text must be bounded.
pub fn validate_job_input(model_name: &str, input_text: &str) -> Result<(), CoreError> {
    if model_name.trim().is_empty() {
        return Err(CoreError::Validation("model_name must not be empty".into()));
    }
    if model_name.len() > MAX_MODEL_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "model_name exceeds {MAX_MODEL_NAME_LEN} characters"
        )));
    }
    if input_text.len() > MAX_INPUT_TEXT_LEN {
        return Err(CoreError::Validation(format!(
            "input_text exceeds {MAX_INPUT_TEXT_LEN} bytes"
        )));
    }
    Ok(())
}

/// A pending job is due once its scheduled time has been reached.
pub fn is_due(status: JobStatus, scheduled_time: Timestamp, now: Timestamp) -> bool {
    status == JobStatus::Pending && scheduled_time <= now
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
