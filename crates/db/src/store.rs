//! The job store abstraction shared by the API, runner and dispatcher.

use async_trait::async_trait;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::types::{JobId, Timestamp};

use crate::error::StoreError;
use crate::models::job::{NewScheduledJob, ScheduledJob, Transition};

/// Persistent set of scheduled jobs.
///
/// Reads may run concurrently. Transitions on one job are serialized, so
/// two callers racing to start the same job see exactly one success and
/// one `InvalidTransition`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Validate and persist a new `pending` job. `now` is the reference
    /// point for the "scheduled in the future" rule.
    async fn create(&self, input: NewScheduledJob, now: Timestamp)
        -> Result<ScheduledJob, StoreError>;

    /// All jobs, ascending by `scheduled_time`.
    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError>;

    async fn get(&self, id: JobId) -> Result<ScheduledJob, StoreError>;

    /// Remove a job permanently, whatever its status.
    async fn delete(&self, id: JobId) -> Result<(), StoreError>;

    /// Apply a lifecycle step. Fails with `NotFound` for an unknown id and
    /// `InvalidTransition` (status unchanged) for a disallowed source state.
    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
    ) -> Result<ScheduledJob, StoreError>;

    async fn mark_running(&self, id: JobId) -> Result<ScheduledJob, StoreError> {
        self.transition(id, Transition::Start).await
    }

    async fn mark_completed(
        &self,
        id: JobId,
        result: PredictionResult,
        actual_runtime_s: f64,
    ) -> Result<ScheduledJob, StoreError> {
        self.transition(
            id,
            Transition::Complete {
                result,
                actual_runtime_s,
            },
        )
        .await
    }

    async fn mark_failed(&self, id: JobId, message: String) -> Result<ScheduledJob, StoreError> {
        self.transition(id, Transition::Fail { message }).await
    }
}
