//! Execution backend client.
//!
//! The backend runs the real inference for a job and reports how long it
//! took. Failures split into two kinds: the backend could not be reached,
//! or it answered with an error of its own.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wattsched_core::error::CoreError;
use wattsched_core::prediction::PredictionResult;
use wattsched_core::types::JobId;

use crate::api::{HttpApi, InferenceApiError};

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRequest {
    pub job_id: JobId,
    pub model_name: String,
    pub input_text: String,
}

/// Successful execution report.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExecutionOutcome {
    pub actual_runtime_s: f64,
    #[serde(default)]
    pub result: Option<PredictionResult>,
}

/// Error body returned by the backend on non-2xx.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// Transport failure or timeout; nothing is known about the run.
    #[error("Execution backend unreachable: {0}")]
    Unreachable(String),

    /// The backend ran (or refused) the job and reported an error.
    #[error("{0}")]
    Rejected(String),
}

impl From<ExecutionError> for CoreError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Unreachable(msg) => CoreError::NetworkUnavailable(msg),
            ExecutionError::Rejected(msg) => CoreError::ExecutionFailure(msg),
        }
    }
}

impl From<InferenceApiError> for ExecutionError {
    fn from(err: InferenceApiError) -> Self {
        match err {
            InferenceApiError::ApiError { status, body } => {
                let message = serde_json::from_str::<ErrorBody>(&body)
                    .map(|b| b.error)
                    .unwrap_or_else(|_| format!("Execution backend returned {status}: {body}"));
                ExecutionError::Rejected(message)
            }
            other => ExecutionError::Unreachable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest)
        -> Result<ExecutionOutcome, ExecutionError>;
}

/// [`ExecutionBackend`] over HTTP.
pub struct HttpExecutionBackend {
    api: HttpApi,
}

impl HttpExecutionBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceApiError> {
        Ok(Self {
            api: HttpApi::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let outcome = self
            .api
            .bounded(async {
                let response = self
                    .api
                    .client()
                    .post(self.api.url("/api/execute"))
                    .json(request)
                    .send()
                    .await?;
                HttpApi::parse_response(response).await
            })
            .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn api_error_body_becomes_rejection_message() {
        let err = ExecutionError::from(InferenceApiError::ApiError {
            status: 500,
            body: r#"{"error": "CUDA out of memory"}"#.into(),
        });
        assert_eq!(err, ExecutionError::Rejected("CUDA out of memory".into()));
    }

    #[test]
    fn non_json_error_body_is_kept_verbatim() {
        let err = ExecutionError::from(InferenceApiError::ApiError {
            status: 502,
            body: "Bad Gateway".into(),
        });
        assert_matches!(err, ExecutionError::Rejected(msg) if msg.contains("Bad Gateway"));
    }

    #[test]
    fn timeout_is_unreachable() {
        let err = ExecutionError::from(InferenceApiError::Timeout(Duration::from_secs(5)));
        assert_matches!(err, ExecutionError::Unreachable(_));
    }

    #[test]
    fn maps_onto_core_errors() {
        assert_matches!(
            CoreError::from(ExecutionError::Rejected("x".into())),
            CoreError::ExecutionFailure(_)
        );
        assert_matches!(
            CoreError::from(ExecutionError::Unreachable("x".into())),
            CoreError::NetworkUnavailable(_)
        );
    }

    #[test]
    fn outcome_result_is_optional() {
        let outcome: ExecutionOutcome =
            serde_json::from_str(r#"{"actual_runtime_s": 1.25}"#).unwrap();
        assert_eq!(outcome.actual_runtime_s, 1.25);
        assert!(outcome.result.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported_as_such() {
        let backend =
            HttpExecutionBackend::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = backend
            .execute(&ExecutionRequest {
                job_id: wattsched_core::types::new_job_id(),
                model_name: "gpt2".into(),
                input_text: String::new(),
            })
            .await
            .unwrap_err();
        assert_matches!(err, ExecutionError::Unreachable(_));
    }
}
