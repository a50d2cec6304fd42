//! Handlers for the `/jobs` resource.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use wattsched_core::accuracy::AccuracyReport;
use wattsched_core::estimation::{scheduling_estimate, CostEstimate};
use wattsched_core::prediction::PredictionResult;
use wattsched_core::types::{JobId, Timestamp};
use wattsched_db::{NewScheduledJob, ScheduledJob};
use wattsched_events::bus::{JOB_CREATED, JOB_DELETED};
use wattsched_events::SchedulerEvent;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Request body for job creation.
///
/// `estimate` is the one the caller previewed. Without it, the estimate is
/// derived from `prediction` (or the scheduling defaults when that is absent
/// too) at the price for `scheduled_time`.
#[derive(Debug, Deserialize)]
pub struct CreateJobInput {
    pub model_name: String,
    #[serde(default)]
    pub input_text: String,
    pub scheduled_time: Timestamp,
    pub estimate: Option<CostEstimate>,
    pub prediction: Option<PredictionResult>,
}

/// POST /api/v1/jobs
///
/// Persist a job with its frozen estimate. Returns 201 with the created job,
/// or 422 if `scheduled_time` is not in the future.
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<CreateJobInput>,
) -> AppResult<impl IntoResponse> {
    let estimate = match input.estimate {
        Some(estimate) => estimate,
        None => {
            let price = state.prices_now().price_at(input.scheduled_time);
            scheduling_estimate(input.prediction.as_ref(), price)
        }
    };
    let new_job = NewScheduledJob {
        model_name: input.model_name,
        input_text: input.input_text,
        scheduled_time: input.scheduled_time,
        estimate,
    };
    let job = state.jobs.create(new_job, Utc::now()).await?;

    tracing::info!(
        job_id = %job.id,
        model_name = %job.model_name,
        scheduled_time = %job.scheduled_time,
        cost_cents = job.estimate.cost_cents,
        "Job scheduled",
    );
    state.event_bus.publish(
        SchedulerEvent::new(JOB_CREATED)
            .for_job(job.id)
            .with_payload(json!({ "scheduled_time": job.scheduled_time })),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// All jobs, ascending by scheduled time.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.jobs.list().await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/{id}
///
/// Permanent, from any status. Returns 204.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    state.jobs.delete(job_id).await?;

    tracing::info!(job_id = %job_id, "Job deleted");
    state
        .event_bus
        .publish(SchedulerEvent::new(JOB_DELETED).for_job(job_id));

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Run now
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub actual_runtime_s: Option<f64>,
    pub job: ScheduledJob,
}

/// POST /api/v1/jobs/{id}/run
///
/// Execute a pending job immediately. On failure the job is left `failed`
/// and the backend's message is returned (502), or 503 if the backend
/// could not be reached.
///
/// The run is detached from the request, so a request timeout or a client
/// disconnect still lets it reach a terminal state.
pub async fn run_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let runner = Arc::clone(&state.runner);
    let job = tokio::spawn(async move { runner.run(job_id).await })
        .await
        .map_err(|e| AppError::InternalError(format!("Run task for job {job_id} failed: {e}")))
        ??;
    Ok(Json(DataResponse {
        data: RunResponse {
            actual_runtime_s: job.actual_runtime_s,
            job,
        },
    }))
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}/accuracy
///
/// Runtime, power and cost accuracy for the job, each with the strategy
/// that produced it.
pub async fn job_accuracy(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(job_id).await?;
    let report: AccuracyReport = job.accuracy_report();
    Ok(Json(DataResponse { data: report }))
}
