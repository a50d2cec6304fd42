use chrono::SubsecRound;

/// Scheduled jobs are keyed by time-ordered UUIDs (v7), assigned at creation.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7()
}

/// Drop sub-microsecond precision, matching what PostgreSQL `TIMESTAMPTZ`
/// stores. Apply before comparing timestamps that will be persisted.
pub fn truncate_to_micros(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(6)
}
