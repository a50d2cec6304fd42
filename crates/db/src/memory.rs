//! In-process [`JobStore`] used when no database is configured, and in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use wattsched_core::scheduling::{validate_job_input, validate_schedule};
use wattsched_core::types::{new_job_id, truncate_to_micros, JobId, Timestamp};

use crate::error::StoreError;
use crate::models::job::{NewScheduledJob, ScheduledJob, Transition};
use crate::store::JobStore;

#[derive(Default)]
struct Index {
    /// `(scheduled_time, id)` kept sorted on every insert.
    order: Vec<(Timestamp, JobId)>,
    jobs: HashMap<JobId, Arc<Mutex<ScheduledJob>>>,
}

/// Jobs held in memory behind a sorted index.
///
/// The index is guarded by a `RwLock`; each job sits behind its own
/// `Mutex` so transitions on different jobs never contend.
#[derive(Default)]
pub struct MemoryJobStore {
    index: RwLock<Index>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: JobId) -> Result<Arc<Mutex<ScheduledJob>>, StoreError> {
        self.index
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
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
        let key = (job.scheduled_time, job.id);

        let mut index = self.index.write().await;
        let pos = index.order.partition_point(|entry| *entry <= key);
        index.order.insert(pos, key);
        index.jobs.insert(job.id, Arc::new(Mutex::new(job.clone())));

        tracing::debug!(job_id = %job.id, scheduled_time = %job.scheduled_time, "Job stored");
        Ok(job)
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>, StoreError> {
        let index = self.index.read().await;
        let mut jobs = Vec::with_capacity(index.order.len());
        for (_, id) in &index.order {
            if let Some(slot) = index.jobs.get(id) {
                jobs.push(slot.lock().await.clone());
            }
        }
        Ok(jobs)
    }

    async fn get(&self, id: JobId) -> Result<ScheduledJob, StoreError> {
        let slot = self.slot(id).await?;
        let job = slot.lock().await.clone();
        Ok(job)
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        let mut index = self.index.write().await;
        if index.jobs.remove(&id).is_none() {
            return Err(StoreError::not_found(id));
        }
        index.order.retain(|(_, entry)| *entry != id);
        Ok(())
    }

    async fn transition(
        &self,
        id: JobId,
        transition: Transition,
    ) -> Result<ScheduledJob, StoreError> {
        let slot = self.slot(id).await?;
        let mut job = slot.lock().await;
        job.apply(transition, Utc::now())?;
        Ok(job.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
