use wattsched_core::error::CoreError;
use wattsched_core::types::JobId;

/// Errors returned by [`JobStore`](crate::store::JobStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(id: JobId) -> Self {
        StoreError::Core(CoreError::NotFound {
            entity: "ScheduledJob",
            id,
        })
    }

    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            StoreError::Core(e) => Some(e),
            StoreError::Database(_) => None,
        }
    }
}
