//! Periodic reload of the job list.
//!
//! Feeds the due-job dispatcher. A failed reload keeps the previous list.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wattsched_db::{JobStore, ScheduledJob};
use wattsched_events::RefreshHandle;

/// Start polling `jobs` every `period` until `cancel` fires or the handle
/// is dropped.
pub fn start(
    jobs: Arc<dyn JobStore>,
    period: Duration,
    cancel: CancellationToken,
) -> RefreshHandle<Vec<ScheduledJob>> {
    RefreshHandle::spawn_with_token("job_list", period, Vec::new(), cancel, move |previous| {
        let jobs = Arc::clone(&jobs);
        async move {
            match jobs.list().await {
                Ok(list) => {
                    tracing::debug!(count = list.len(), "Job list refreshed");
                    list
                }
                Err(e) => {
                    tracing::error!(error = %e, "Job list refresh failed, keeping previous");
                    previous
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use wattsched_core::estimation::scheduling_estimate;
    use wattsched_db::{MemoryJobStore, NewScheduledJob};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn picks_up_new_jobs_on_next_tick() {
        let store = Arc::new(MemoryJobStore::new());
        let handle = start(store.clone(), Duration::from_secs(30), CancellationToken::new());
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());

        let now = Utc::now();
        store
            .create(
                NewScheduledJob {
                    model_name: "gpt2".into(),
                    input_text: String::new(),
                    scheduled_time: now + ChronoDuration::hours(1),
                    estimate: scheduling_estimate(None, 85.2),
                },
                now,
            )
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
