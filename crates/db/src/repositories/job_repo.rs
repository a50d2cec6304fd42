//! Repository for the `scheduled_jobs` table, and the PostgreSQL
//! [`JobStore`].

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use wattsched_core::error::CoreError;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::scheduling::{
    state_machine, validate_job_input, validate_schedule, JobStatus,
};
use wattsched_core::types::{new_job_id, truncate_to_micros, JobId, Timestamp};

use crate::error::StoreError;
use crate::models::job::{JobRow, NewScheduledJob, ScheduledJob, Transition};
use crate::store::JobStore;

/// Column list for `scheduled_jobs` queries.
const COLUMNS: &str = "\
    id, model_name, input_text, scheduled_time, status, \
    cost_cents, runtime_s, energy_wh, price_per_mwh, created_at, \
    actual_runtime_s, result, error_message, started_at, finished_at";

/// Provides SQL operations for scheduled jobs.
pub struct JobRepo;

impl JobRepo {
    pub async fn insert(pool: &PgPool, job: &ScheduledJob) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO scheduled_jobs \
                 (id, model_name, input_text, scheduled_time, status, \
                  cost_cents, runtime_s, energy_wh, price_per_mwh, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job.id)
            .bind(&job.model_name)
            .bind(&job.input_text)
            .bind(job.scheduled_time)
            .bind(job.status.as_str())
            .bind(job.estimate.cost_cents)
            .bind(job.estimate.runtime_s)
            .bind(job.estimate.energy_wh)
            .bind(job.estimate.price_per_mwh)
            .bind(job.created_at)
            .fetch_one(pool)
            .await
    }

    /// All jobs ordered by scheduled time; ties broken by id.
    pub async fn list(pool: &PgPool) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scheduled_jobs ORDER BY scheduled_time ASC, id ASC"
        );
        sqlx::query_as::<_, JobRow>(&query).fetch_all(pool).await
    }

    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scheduled_jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_status(pool: &PgPool, id: JobId) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT status FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM scheduled_jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a job from `from` to `running`. `None` if the job is missing or
    /// not in `from`.
    pub async fn start(
        pool: &PgPool,
        id: JobId,
        from: JobStatus,
        at: Timestamp,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE scheduled_jobs SET status = $2, started_at = $4 \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Running.as_str())
            .bind(from.as_str())
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    pub async fn complete(
        pool: &PgPool,
        id: JobId,
        from: JobStatus,
        result: Json<&PredictionResult>,
        actual_runtime_s: f64,
        at: Timestamp,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE scheduled_jobs \
             SET status = $2, result = $4, actual_runtime_s = $5, finished_at = $6 \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Completed.as_str())
            .bind(from.as_str())
            .bind(result)
            .bind(actual_runtime_s)
            .bind(at)
            .fetch_optional(pool)
            .await
    }

    pub async fn fail(
        pool: &PgPool,
        id: JobId,
        from: JobStatus,
        message: &str,
        at: Timestamp,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE scheduled_jobs \
             SET status = $2, error_message = $4, finished_at = $5 \
             WHERE id = $1 AND status = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Failed.as_str())
            .bind(from.as_str())
            .bind(message)
            .bind(at)
            .fetch_optional(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// PgJobStore
// ---------------------------------------------------------------------------

/// [`JobStore`] backed by PostgreSQL.
///
/// Each transition is a single conditional `UPDATE`, so concurrent writers
/// on one job are serialized by the row lock.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Work out why a conditional update matched nothing.
    async fn explain_miss(&self, id: JobId, to: JobStatus) -> StoreError {
        match JobRepo::find_status(&self.pool, id).await {
            Ok(None) => StoreError::not_found(id),
            Ok(Some(raw)) => match raw.parse::<JobStatus>() {
                Ok(from) => CoreError::InvalidTransition { id, from, to }.into(),
                Err(e) => e.into(),
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(
        &self,
        mut input: NewScheduledJob,
        now: Timestamp,
    ) -> Result<ScheduledJob, StoreError> {
        input.scheduled_time = truncate_to_micros(input.scheduled_time);
        let now = truncate_to_micros(now);
        validate_job_input(&input.model_name, &input.input_text)?;
        validate_schedule(input.scheduled_time, now)?;

        let job = ScheduledJob::pending(new_job_id(), input, now);
        let row = JobRepo::insert(&self.pool, &job).await?;
        Ok(row.try_into()?)
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        let rows = JobRepo::list(&self.pool).await?;
        rows.into_iter()
            .map(|row| ScheduledJob::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn get(&self, id: JobId) -> Result<ScheduledJob, StoreError> {
        let row = JobRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| StoreError::not_found(id))?;
        Ok(row.try_into()?)
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        if JobRepo::delete(&self.pool, id).await? {
            Ok(())
        } else {
            Err(StoreError::not_found(id))
        }
    }

    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
    ) -> Result<ScheduledJob, StoreError> {
        let to = transition.target();
        let from = state_machine::required_source(to).ok_or_else(|| {
            CoreError::Internal(format!("No transition leads to {to}"))
        })?;
        let at = Utc::now();

        let row = match &transition {
            Transition::Start => JobRepo::start(&self.pool, id, from, at).await?,
            Transition::Complete {
                result,
                actual_runtime_s,
            } => {
                JobRepo::complete(&self.pool, id, from, Json(result), *actual_runtime_s, at)
                    .await?
            }
            Transition::Fail { message } => {
                JobRepo::fail(&self.pool, id, from, message, at).await?
            }
        };

        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(self.explain_miss(id, to).await),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
