//! Scheduled job entity, creation DTO and row mapping.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use wattsched_core::accuracy::{AccuracyContext, AccuracyReport};
use wattsched_core::error::CoreError;
use wattsched_core::estimation::CostEstimate;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::scheduling::{state_machine, JobStatus};
use wattsched_core::types::{JobId, Timestamp};

/// A job scheduled for future execution, with its estimate frozen at
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub model_name: String,
    pub input_text: String,
    pub scheduled_time: Timestamp,
    pub status: JobStatus,
    pub estimate: CostEstimate,
    pub created_at: Timestamp,
    pub actual_runtime_s: Option<f64>,
    pub result: Option<PredictionResult>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

/// DTO for `POST /api/v1/jobs`.
///
/// The estimate is whatever the caller previewed; it is stored as given.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledJob {
    pub model_name: String,
    #[serde(default)]
    pub input_text: String,
    pub scheduled_time: Timestamp,
    pub estimate: CostEstimate,
}

/// A lifecycle step applied to an existing job.
#[derive(Debug, Clone)]
pub enum Transition {
    Start,
    Complete {
        result: PredictionResult,
        actual_runtime_s: f64,
    },
    Fail {
        message: String,
    },
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Running,
            Transition::Complete { .. } => JobStatus::Completed,
            Transition::Fail { .. } => JobStatus::Failed,
        }
    }
}

impl ScheduledJob {
    /// Build a fresh `pending` job. Validation is the caller's concern.
    pub fn pending(id: JobId, input: NewScheduledJob, created_at: Timestamp) -> Self {
        Self {
            id,
            model_name: input.model_name,
            input_text: input.input_text,
            scheduled_time: input.scheduled_time,
            status: JobStatus::Pending,
            estimate: input.estimate,
            created_at,
            actual_runtime_s: None,
            result: None,
            error_message: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Apply `transition` in place, or leave the job untouched and fail with
    /// `InvalidTransition`.
    pub fn apply(&mut self, transition: Transition, at: Timestamp) -> Result<(), CoreError> {
        let to = transition.target();
        state_machine::validate_transition(self.id, self.status, to)?;
        match transition {
            Transition::Start => self.started_at = Some(at),
            Transition::Complete {
                result,
                actual_runtime_s,
            } => {
                self.actual_runtime_s = Some(actual_runtime_s);
                self.result = Some(result);
                self.finished_at = Some(at);
            }
            Transition::Fail { message } => {
                self.error_message = Some(message);
                self.finished_at = Some(at);
            }
        }
        self.status = to;
        Ok(())
    }

    /// Score the job's prediction against what actually happened.
    ///
    /// Missing predicted values are taken from the frozen estimate and the
    /// recorded runtime stands in for a missing actual; the scheduling-time
    /// price is used to re-derive actual cost.
    pub fn accuracy_report(&self) -> AccuracyReport {
        let mut prediction = self.result.clone().unwrap_or_default();
        prediction.predicted_runtime_s = prediction
            .predicted_runtime()
            .or(Some(self.estimate.runtime_s));
        prediction.cost_cents = prediction
            .predicted_cost_cents()
            .or(Some(self.estimate.cost_cents));
        prediction.actual_runtime_s = prediction.actual_runtime().or(self.actual_runtime_s);
        let ctx = AccuracyContext {
            scheduling_price_per_mwh: Some(self.estimate.price_per_mwh),
        };
        AccuracyReport::evaluate(&prediction, &ctx)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// A row from the `scheduled_jobs` table.
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: JobId,
    pub model_name: String,
    pub input_text: String,
    pub scheduled_time: Timestamp,
    pub status: String,
    pub cost_cents: f64,
    pub runtime_s: f64,
    pub energy_wh: f64,
    pub price_per_mwh: f64,
    pub created_at: Timestamp,
    pub actual_runtime_s: Option<f64>,
    pub result: Option<Json<PredictionResult>>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl TryFrom<JobRow> for ScheduledJob {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| CoreError::Internal(format!("Corrupt job row {}: {e}", row.id)))?;
        Ok(Self {
            id: row.id,
            model_name: row.model_name,
            input_text: row.input_text,
            scheduled_time: row.scheduled_time,
            status,
            estimate: CostEstimate {
                cost_cents: row.cost_cents,
                runtime_s: row.runtime_s,
                energy_wh: row.energy_wh,
                price_per_mwh: row.price_per_mwh,
            },
            created_at: row.created_at,
            actual_runtime_s: row.actual_runtime_s,
            result: row.result.map(|Json(r)| r),
            error_message: row.error_message,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use wattsched_core::estimation::estimate;
    use wattsched_core::types::new_job_id;

    use super::*;

    fn job() -> ScheduledJob {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        ScheduledJob::pending(
            new_job_id(),
            NewScheduledJob {
                model_name: "gpt2".into(),
                input_text: "hello".into(),
                scheduled_time: now + Duration::hours(1),
                estimate: estimate(2.0, 30.0, 100.0),
            },
            now,
        )
    }

    #[test]
    fn completion_records_actuals() {
        let mut job = job();
        let at = job.scheduled_time;
        job.apply(Transition::Start, at).unwrap();
        job.apply(
            Transition::Complete {
                result: PredictionResult::default(),
                actual_runtime_s: 2.0,
            },
            at,
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.actual_runtime_s, Some(2.0));
        assert_eq!(job.started_at, Some(at));
        assert_eq!(job.finished_at, Some(at));
    }

    #[test]
    fn rejected_transition_leaves_job_untouched() {
        let mut job = job();
        let before = job.clone();
        let err = job
            .apply(
                Transition::Complete {
                    result: PredictionResult::default(),
                    actual_runtime_s: 1.0,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_matches!(
            err,
            CoreError::InvalidTransition {
                from: JobStatus::Pending,
                to: JobStatus::Completed,
                ..
            }
        );
        assert_eq!(job, before);
    }

    #[test]
    fn failure_preserves_message() {
        let mut job = job();
        job.apply(Transition::Start, Utc::now()).unwrap();
        job.apply(
            Transition::Fail {
                message: "executor crashed".into(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("executor crashed"));
    }

    #[test]
    fn accuracy_falls_back_to_frozen_estimate() {
        let mut job = job();
        job.actual_runtime_s = Some(2.0);
        let report = job.accuracy_report();
        assert_eq!(report.runtime.source, "direct_fields");
        assert_eq!(report.runtime.value, 100.0);
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        let job = job();
        let row = JobRow {
            id: job.id,
            model_name: job.model_name,
            input_text: job.input_text,
            scheduled_time: job.scheduled_time,
            status: "paused".into(),
            cost_cents: 0.0,
            runtime_s: 0.0,
            energy_wh: 0.0,
            price_per_mwh: 0.0,
            created_at: job.created_at,
            actual_runtime_s: None,
            result: None,
            error_message: None,
            started_at: None,
            finished_at: None,
        };
        assert_matches!(ScheduledJob::try_from(row), Err(CoreError::Internal(_)));
    }
}
