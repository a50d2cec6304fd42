//! Runs a single scheduled job.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wattsched_core::error::CoreError;
use wattsched_core::types::JobId;
use wattsched_db::{JobStore, ScheduledJob, StoreError};
use wattsched_events::bus::{JOB_COMPLETED, JOB_FAILED, JOB_RUNNING};
use wattsched_events::{EventBus, SchedulerEvent};
use wattsched_inference::{ExecutionBackend, ExecutionError, ExecutionOutcome, ExecutionRequest};

/// Thin orchestration around the execution backend.
///
/// `pending -> running`, execute, then `completed` or `failed`. A failed
/// execution is recorded on the job and also returned to the caller. There
/// is no retry.
pub struct JobRunner {
    jobs: Arc<dyn JobStore>,
    backend: Arc<dyn ExecutionBackend>,
    event_bus: Arc<EventBus>,
    timeout: Duration,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        backend: Arc<dyn ExecutionBackend>,
        event_bus: Arc<EventBus>,
        timeout: Duration,
    ) -> Self {
        Self {
            jobs,
            backend,
            event_bus,
            timeout,
        }
    }

    /// Execute job `id` now and return it in its terminal state.
    ///
    /// Fails with `NotFound` or `InvalidTransition` before anything runs if
    /// the job is unknown or not `pending`. An execution error is returned
    /// as `ExecutionFailure` (backend reported it) or `NetworkUnavailable`
    /// (backend unreachable) after the job has been marked `failed`.
    pub async fn run(&self, id: JobId) -> Result<ScheduledJob, StoreError> {
        let job = self.jobs.mark_running(id).await?;
        tracing::info!(job_id = %id, model_name = %job.model_name, "Job started");
        self.event_bus
            .publish(SchedulerEvent::new(JOB_RUNNING).for_job(id));

        let request = ExecutionRequest {
            job_id: id,
            model_name: job.model_name,
            input_text: job.input_text,
        };

        match self.execute(&request).await {
            Ok(outcome) => self.complete(id, outcome).await,
            Err(err) => Err(self.fail(id, err).await),
        }
    }

    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutionError> {
        tokio::time::timeout(self.timeout, self.backend.execute(request))
            .await
            .map_err(|_| {
                ExecutionError::Unreachable(format!(
                    "Execution timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }

    async fn complete(
        &self,
        id: JobId,
        outcome: ExecutionOutcome,
    ) -> Result<ScheduledJob, StoreError> {
        let mut result = outcome.result.unwrap_or_default();
        result.actual_runtime_s = result.actual_runtime_s.or(Some(outcome.actual_runtime_s));

        let job = self
            .jobs
            .mark_completed(id, result, outcome.actual_runtime_s)
            .await?;

        tracing::info!(
            job_id = %id,
            actual_runtime_s = outcome.actual_runtime_s,
            "Job completed",
        );
        self.event_bus.publish(
            SchedulerEvent::new(JOB_COMPLETED)
                .for_job(id)
                .with_payload(json!({ "actual_runtime_s": outcome.actual_runtime_s })),
        );
        Ok(job)
    }

    /// Record the failure and hand back the error to surface.
    async fn fail(&self, id: JobId, err: ExecutionError) -> StoreError {
        let message = err.to_string();
        tracing::warn!(job_id = %id, error = %message, "Job execution failed");

        if let Err(e) = self.jobs.mark_failed(id, message.clone()).await {
            tracing::error!(job_id = %id, error = %e, "Could not record job failure");
        }
        self.event_bus.publish(
            SchedulerEvent::new(JOB_FAILED)
                .for_job(id)
                .with_payload(json!({ "error": message })),
        );
        CoreError::from(err).into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use wattsched_core::estimation::scheduling_estimate;
    use wattsched_core::scheduling::JobStatus;
    use wattsched_db::{MemoryJobStore, NewScheduledJob};

    use super::*;

    enum Behaviour {
        Succeed(f64),
        Reject(&'static str),
        Unreachable,
        Hang,
    }

    struct StubBackend(Behaviour);

    #[async_trait]
    impl ExecutionBackend for StubBackend {
        async fn execute(
            &self,
            _: &ExecutionRequest,
        ) -> Result<ExecutionOutcome, ExecutionError> {
            match self.0 {
                Behaviour::Succeed(secs) => Ok(ExecutionOutcome {
                    actual_runtime_s: secs,
                    result: None,
                }),
                Behaviour::Reject(msg) => Err(ExecutionError::Rejected(msg.into())),
                Behaviour::Unreachable => {
                    Err(ExecutionError::Unreachable("connection refused".into()))
                }
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("the runner timeout fires first")
                }
            }
        }
    }

    async fn setup(behaviour: Behaviour) -> (JobRunner, Arc<MemoryJobStore>, JobId) {
        let store = Arc::new(MemoryJobStore::new());
        let now = Utc::now();
        let job = store
            .create(
                NewScheduledJob {
                    model_name: "gpt2".into(),
                    input_text: "hi".into(),
                    scheduled_time: now + ChronoDuration::hours(1),
                    estimate: scheduling_estimate(None, 85.2),
                },
                now,
            )
            .await
            .unwrap();
        let runner = JobRunner::new(
            store.clone(),
            Arc::new(StubBackend(behaviour)),
            Arc::new(EventBus::default()),
            Duration::from_secs(5),
        );
        (runner, store, job.id)
    }

    #[tokio::test]
    async fn success_marks_completed_with_runtime() {
        let (runner, store, id) = setup(Behaviour::Succeed(1.75)).await;
        let job = runner.run(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.actual_runtime_s, Some(1.75));
        assert_eq!(
            job.result.and_then(|r| r.actual_runtime_s),
            Some(1.75)
        );
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn rejection_marks_failed_and_surfaces_message() {
        let (runner, store, id) = setup(Behaviour::Reject("model not loaded")).await;
        let err = runner.run(id).await.unwrap_err();
        assert_matches!(err, StoreError::Core(CoreError::ExecutionFailure(ref m)) if m == "model not loaded");

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("model not loaded"));
    }

    #[tokio::test]
    async fn unreachable_backend_marks_failed() {
        let (runner, store, id) = setup(Behaviour::Unreachable).await;
        let err = runner.run(id).await.unwrap_err();
        assert_matches!(err, StoreError::Core(CoreError::NetworkUnavailable(_)));
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_backend_times_out_and_fails_job() {
        let (runner, store, id) = setup(Behaviour::Hang).await;
        let err = runner.run(id).await.unwrap_err();
        assert_matches!(err, StoreError::Core(CoreError::NetworkUnavailable(ref m)) if m.contains("timed out"));
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn second_run_is_an_invalid_transition() {
        let (runner, store, id) = setup(Behaviour::Succeed(1.0)).await;
        runner.run(id).await.unwrap();
        assert_matches!(
            runner.run(id).await,
            Err(StoreError::Core(CoreError::InvalidTransition { .. }))
        );
        assert_eq!(store.get(id).await.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let (runner, _store, id) = setup(Behaviour::Succeed(1.0)).await;
        let mut rx = runner.event_bus.subscribe();
        runner.run(id).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, JOB_RUNNING);
        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.event_type, JOB_COMPLETED);
        assert_eq!(completed.job_id, Some(id));
    }
}
