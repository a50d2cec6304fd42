//! Prediction service client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use wattsched_core::prediction::PredictionResult;

use crate::api::{HttpApi, InferenceApiError};

/// Body of `POST /api/predict`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub model_name: String,
    pub input_text: String,
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, request: &PredictionRequest)
        -> Result<PredictionResult, InferenceApiError>;
}

/// [`PredictionService`] over HTTP.
pub struct HttpPredictionService {
    api: HttpApi,
}

impl HttpPredictionService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceApiError> {
        Ok(Self {
            api: HttpApi::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResult, InferenceApiError> {
        self.api
            .bounded(async {
                let response = self
                    .api
                    .client()
                    .post(self.api.url("/api/predict"))
                    .json(request)
                    .send()
                    .await?;
                HttpApi::parse_response(response).await
            })
            .await
    }
}
