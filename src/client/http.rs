use super::{parse_response, EstimationRequest, Estimator};
use crate::core::EstimationResult;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub endpoint: String,

    /// Per-request timeout; expiry is a transport error
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Sent as a bearer token when present
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl HttpClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_ms: default_timeout_ms(),
            api_key: None,
        }
    }
}

/// `Estimator` over HTTP: `POST <endpoint>` with the JSON window body
pub struct HttpEstimationClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpEstimationClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "estimation endpoint is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("http client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl Estimator for HttpEstimationClient {
    async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult> {
        let mut builder = self.client.post(&self.config.endpoint).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PipelineError::TransportError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                body
            };
            return Err(PipelineError::BackendError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PipelineError::TransportError(e.to_string()))?;
        debug!(
            "window {} answered with {} bytes",
            request.window_id(),
            body.len()
        );

        parse_response(request, &body)
    }
}
