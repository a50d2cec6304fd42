#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use tokio::sync::watch;
use tower::ServiceExt;

use wattsched_api::config::ServerConfig;
use wattsched_api::engine::runner::JobRunner;
use wattsched_api::router::build_app_router;
use wattsched_api::state::AppState;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::pricing::{PriceForecast, PriceSnapshot};
use wattsched_core::types::Timestamp;
use wattsched_db::MemoryJobStore;
use wattsched_events::EventBus;
use wattsched_inference::{
    ExecutionBackend, ExecutionError, ExecutionOutcome, ExecutionRequest, InferenceApiError,
    PredictionRequest, PredictionService, PriceSource,
};

/// Build a test `ServerConfig` with safe defaults.
///
/// Upstream URLs are never dialled; every upstream is stubbed.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        prediction_service_url: "http://127.0.0.1:9".to_string(),
        price_service_url: "http://127.0.0.1:9".to_string(),
        executor_url: "http://127.0.0.1:9".to_string(),
        upstream_timeout_secs: 1,
        execution_timeout_secs: 5,
        job_poll_interval_secs: 30,
        price_poll_interval_secs: 300,
        database_url: None,
    }
}

// ---------------------------------------------------------------------------
// Upstream stubs
// ---------------------------------------------------------------------------

/// Returns the configured prediction, or fails as if the service were down.
pub struct StubPredictions(pub Option<PredictionResult>);

#[async_trait]
impl PredictionService for StubPredictions {
    async fn predict(
        &self,
        _: &PredictionRequest,
    ) -> Result<PredictionResult, InferenceApiError> {
        self.0
            .clone()
            .ok_or(InferenceApiError::Timeout(Duration::from_secs(1)))
    }
}

/// Quotes a flat price, or fails when `None`.
pub struct StubPrices(pub Option<f64>);

#[async_trait]
impl PriceSource for StubPrices {
    async fn price_at(&self, _: Timestamp) -> Result<f64, InferenceApiError> {
        self.0.ok_or(InferenceApiError::Timeout(Duration::from_secs(1)))
    }

    async fn forecast(&self) -> Result<PriceForecast, InferenceApiError> {
        Err(InferenceApiError::Timeout(Duration::from_secs(1)))
    }
}

pub enum Execution {
    Succeed(f64),
    /// Sleeps for the given time, then succeeds with it as the runtime.
    Slow(Duration),
    Reject(&'static str),
    Unreachable,
}

pub struct StubBackend(pub Execution);

#[async_trait]
impl ExecutionBackend for StubBackend {
    async fn execute(&self, _: &ExecutionRequest) -> Result<ExecutionOutcome, ExecutionError> {
        match self.0 {
            Execution::Succeed(secs) => Ok(ExecutionOutcome {
                actual_runtime_s: secs,
                result: None,
            }),
            Execution::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(ExecutionOutcome {
                    actual_runtime_s: delay.as_secs_f64(),
                    result: None,
                })
            }
            Execution::Reject(msg) => Err(ExecutionError::Rejected(msg.to_string())),
            Execution::Unreachable => Err(ExecutionError::Unreachable(
                "connection refused".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// App builder
// ---------------------------------------------------------------------------

/// Knobs for [`build_test_app_with`].
pub struct TestUpstreams {
    pub prediction: Option<PredictionResult>,
    pub quote: Option<f64>,
    pub snapshot: PriceSnapshot,
    pub execution: Execution,
    pub config: ServerConfig,
}

impl Default for TestUpstreams {
    fn default() -> Self {
        Self {
            prediction: Some(sample_prediction()),
            quote: Some(70.0),
            snapshot: PriceSnapshot::default(),
            execution: Execution::Succeed(1.5),
            config: test_config(),
        }
    }
}

/// Build the full application router over an in-memory store with default
/// stubs.
pub fn build_test_app() -> Router {
    build_test_app_with(TestUpstreams::default())
}

/// Build the full application router with the given upstream behaviour.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack. Background refreshes are not started.
pub fn build_test_app_with(upstreams: TestUpstreams) -> Router {
    let config = upstreams.config;
    let jobs = Arc::new(MemoryJobStore::new());
    let event_bus = Arc::new(EventBus::default());
    let runner = Arc::new(JobRunner::new(
        jobs.clone(),
        Arc::new(StubBackend(upstreams.execution)),
        Arc::clone(&event_bus),
        config.execution_timeout(),
    ));
    let (_tx, price_snapshot) = watch::channel(upstreams.snapshot);

    let state = AppState {
        jobs,
        runner,
        predictions: Arc::new(StubPredictions(upstreams.prediction)),
        prices: Arc::new(StubPrices(upstreams.quote)),
        price_snapshot,
        event_bus,
        pool: None,
    };

    build_app_router(state, &config)
}

/// Prediction as the service would return it: 12 s at 40 W.
pub fn sample_prediction() -> PredictionResult {
    PredictionResult {
        predicted_runtime_s: Some(12.0),
        predicted_power_w: Some(40.0),
        ..Default::default()
    }
}

pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(hours)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
