//! Electricity price source client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use wattsched_core::pricing::PriceForecast;
use wattsched_core::types::Timestamp;

use crate::api::{HttpApi, InferenceApiError};

/// Body of `GET /api/price`.
#[derive(Debug, Deserialize)]
struct PriceQuote {
    price: f64,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Price in EUR/MWh for the hour containing `at`.
    async fn price_at(&self, at: Timestamp) -> Result<f64, InferenceApiError>;

    async fn forecast(&self) -> Result<PriceForecast, InferenceApiError>;
}

/// [`PriceSource`] over HTTP.
pub struct HttpPriceSource {
    api: HttpApi,
}

impl HttpPriceSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceApiError> {
        Ok(Self {
            api: HttpApi::new(base_url, timeout)?,
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn price_at(&self, at: Timestamp) -> Result<f64, InferenceApiError> {
        self.api
            .bounded(async {
                let response = self
                    .api
                    .client()
                    .get(self.api.url("/api/price"))
                    .query(&[("timestamp", at.to_rfc3339())])
                    .send()
                    .await?;
                let quote: PriceQuote = HttpApi::parse_response(response).await?;
                Ok::<_, InferenceApiError>(quote.price)
            })
            .await
    }

    async fn forecast(&self) -> Result<PriceForecast, InferenceApiError> {
        self.api
            .bounded(async {
                let response = self
                    .api
                    .client()
                    .get(self.api.url("/api/prices/forecast"))
                    .send()
                    .await?;
                HttpApi::parse_response(response).await
            })
            .await
    }
}
