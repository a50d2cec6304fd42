//! Starts pending jobs once their scheduled time arrives.
//!
//! Consumes the job-list refresh: every time a new list is published, each
//! job that is `pending` with `scheduled_time <= now` is handed to the
//! [`JobRunner`]. A job picked up twice (two refreshes, or a manual run
//! racing the dispatcher) is harmless: only one `mark_running` succeeds.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wattsched_core::error::CoreError;
use wattsched_core::scheduling::is_due;
use wattsched_core::types::Timestamp;
use wattsched_db::{ScheduledJob, StoreError};

use super::runner::JobRunner;

/// Per-cycle tally, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    /// Already taken by someone else.
    pub skipped: usize,
}

pub struct DueJobDispatcher {
    runner: Arc<JobRunner>,
}

impl DueJobDispatcher {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self { runner }
    }

    /// Run until `cancel` fires or the job-list refresh goes away.
    pub async fn run(
        &self,
        mut job_list: watch::Receiver<Vec<ScheduledJob>>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Due-job dispatcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Due-job dispatcher shutting down");
                    break;
                }
                changed = job_list.changed() => {
                    if changed.is_err() {
                        tracing::info!("Job list refresh closed, dispatcher exiting");
                        break;
                    }
                    let jobs = job_list.borrow_and_update().clone();
                    let summary = self.dispatch_due(&jobs, Utc::now()).await;
                    if summary.started > 0 {
                        tracing::info!(
                            started = summary.started,
                            completed = summary.completed,
                            failed = summary.failed,
                            skipped = summary.skipped,
                            "Dispatch cycle finished",
                        );
                    }
                }
            }
        }
    }

    /// Run every due job in `jobs` concurrently and wait for all of them.
    pub async fn dispatch_due(&self, jobs: &[ScheduledJob], now: Timestamp) -> DispatchSummary {
        let due: Vec<_> = jobs
            .iter()
            .filter(|job| is_due(job.status, job.scheduled_time, now))
            .map(|job| job.id)
            .collect();

        let mut summary = DispatchSummary {
            started: due.len(),
            ..Default::default()
        };
        if due.is_empty() {
            return summary;
        }

        let results = join_all(due.iter().map(|id| self.runner.run(*id))).await;

        for (id, result) in due.iter().zip(results) {
            match result {
                Ok(_) => summary.completed += 1,
                Err(StoreError::Core(
                    CoreError::InvalidTransition { .. } | CoreError::NotFound { .. },
                )) => {
                    tracing::debug!(job_id = %id, "Job already taken or deleted, skipping");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Scheduled run failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use wattsched_core::estimation::scheduling_estimate;
    use wattsched_core::scheduling::JobStatus;
    use wattsched_db::{JobStore, MemoryJobStore, NewScheduledJob};
    use wattsched_events::EventBus;
    use wattsched_inference::{
        ExecutionBackend, ExecutionError, ExecutionOutcome, ExecutionRequest,
    };

    use super::*;

    struct InstantBackend;

    #[async_trait]
    impl ExecutionBackend for InstantBackend {
        async fn execute(
            &self,
            request: &ExecutionRequest,
        ) -> Result<ExecutionOutcome, ExecutionError> {
            if request.model_name == "broken" {
                return Err(ExecutionError::Rejected("bad weights".into()));
            }
            Ok(ExecutionOutcome {
                actual_runtime_s: 0.5,
                result: None,
            })
        }
    }

    async fn seed(store: &MemoryJobStore, model: &str, at: Timestamp, now: Timestamp) {
        store
            .create(
                NewScheduledJob {
                    model_name: model.into(),
                    input_text: String::new(),
                    scheduled_time: at,
                    estimate: scheduling_estimate(None, 85.2),
                },
                now,
            )
            .await
            .unwrap();
    }

    fn dispatcher(store: Arc<MemoryJobStore>) -> DueJobDispatcher {
        DueJobDispatcher::new(Arc::new(JobRunner::new(
            store,
            Arc::new(InstantBackend),
            Arc::new(EventBus::default()),
            Duration::from_secs(5),
        )))
    }

    #[tokio::test]
    async fn only_due_pending_jobs_are_run() {
        let store = Arc::new(MemoryJobStore::new());
        let created = Utc::now();
        let now = created + ChronoDuration::hours(2);
        seed(&store, "gpt2", created + ChronoDuration::hours(1), created).await;
        seed(&store, "broken", created + ChronoDuration::minutes(30), created).await;
        seed(&store, "later", created + ChronoDuration::hours(3), created).await;

        let jobs = store.list().await.unwrap();
        let summary = dispatcher(store.clone()).dispatch_due(&jobs, now).await;

        assert_eq!(
            summary,
            DispatchSummary {
                started: 2,
                completed: 1,
                failed: 1,
                skipped: 0,
            }
        );
        let statuses: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|j| (j.model_name, j.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("broken".to_string(), JobStatus::Failed),
                ("gpt2".to_string(), JobStatus::Completed),
                ("later".to_string(), JobStatus::Pending),
            ]
        );
    }

    #[tokio::test]
    async fn stale_list_entries_are_skipped() {
        let store = Arc::new(MemoryJobStore::new());
        let created = Utc::now();
        seed(&store, "gpt2", created + ChronoDuration::minutes(1), created).await;
        let jobs = store.list().await.unwrap();
        let dispatcher = dispatcher(store.clone());
        let now = created + ChronoDuration::minutes(5);

        dispatcher.dispatch_due(&jobs, now).await;
        // Same stale snapshot again: the job is no longer pending.
        let summary = dispatcher.dispatch_due(&jobs, now).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.completed, 0);
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancel() {
        let store = Arc::new(MemoryJobStore::new());
        let (_tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let dispatcher = dispatcher(store);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), dispatcher.run(rx, cancel))
            .await
            .expect("dispatcher should exit once cancelled");
    }

    #[tokio::test]
    async fn run_loop_dispatches_published_lists() {
        let store = Arc::new(MemoryJobStore::new());
        let created = Utc::now() - ChronoDuration::minutes(10);
        seed(&store, "gpt2", created + ChronoDuration::minutes(1), created).await;

        let (tx, rx) = watch::channel(Vec::new());
        let cancel = CancellationToken::new();
        let dispatcher = dispatcher(store.clone());
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.run(rx, cancel).await })
        };

        tx.send(store.list().await.unwrap()).unwrap();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("dispatcher should exit when the list closes")
            .unwrap();

        assert_eq!(store.list().await.unwrap()[0].status, JobStatus::Completed);
    }
}
