use std::sync::Arc;

use tokio::sync::watch;
use wattsched_core::pricing::PriceSnapshot;
use wattsched_db::{DbPool, JobStore};
use wattsched_events::EventBus;
use wattsched_inference::{PredictionService, PriceSource};

use crate::engine::runner::JobRunner;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is a `watch` receiver.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub runner: Arc<JobRunner>,
    pub predictions: Arc<dyn PredictionService>,
    pub prices: Arc<dyn PriceSource>,
    /// Latest forecast published by the price refresh.
    pub price_snapshot: watch::Receiver<PriceSnapshot>,
    pub event_bus: Arc<EventBus>,
    /// Set only when jobs are stored in PostgreSQL.
    pub pool: Option<DbPool>,
}

impl AppState {
    /// Clone of the current price snapshot; the watch borrow is released
    /// before returning.
    pub fn prices_now(&self) -> PriceSnapshot {
        self.price_snapshot.borrow().clone()
    }
}
