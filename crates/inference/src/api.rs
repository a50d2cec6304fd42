//! Shared HTTP plumbing for the upstream clients.

use std::future::Future;
use std::time::Duration;

/// Errors from the upstream HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum InferenceApiError {
    /// The request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// No answer within the configured bound.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The service returned a non-2xx status code.
    #[error("Upstream API error ({status}): {body}")]
    ApiError { status: u16, body: String },
}

/// A base URL, a shared [`reqwest::Client`] and a per-call time bound.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpApi {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, InferenceApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Reuse an existing client (connection pooling across services).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `call` under the time bound, independent of the client's own
    /// timeout so body reads are covered too.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, InferenceApiError>
    where
        F: Future<Output = Result<T, InferenceApiError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| InferenceApiError::Timeout(self.timeout))?
    }

    /// Return the response unchanged on 2xx, otherwise an
    /// [`InferenceApiError::ApiError`] with the status and body text.
    pub async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InferenceApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InferenceApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    pub async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, InferenceApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
