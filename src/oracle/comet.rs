//! HTTP client for a remote quality-estimation service.
//!
//! Speaks a small JSON protocol: `POST /predict` with the batch, answer with
//! index-aligned scores and a system score. One attempt per call; failures
//! surface to the caller unchanged.

use crate::models::{OracleConfig, OracleError, PrefsError, Result, ScoringTask};
use crate::oracle::{BatchScores, ScoringOracle};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Prediction request payload.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    model: &'a str,
    batch_size: usize,
    data: &'a [ScoringTask],
}

/// Prediction response payload.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    scores: Vec<f64>,
    system_score: f64,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Client for one model hosted behind a scoring service.
pub struct CometClient {
    client: reqwest::Client,
    /// Base URL for the service
    base_url: String,
    /// Model identifier sent with every request
    model: String,
    /// API key (None for services without auth)
    api_key: Option<String>,
    /// Request timeout
    timeout: Duration,
}

impl CometClient {
    /// Create a new client.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let base_url: String = base_url.into();

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PrefsError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            timeout,
        })
    }

    /// Create a client for `model` using the connection settings in `config`.
    pub fn from_config(config: &OracleConfig, model: &str, api_key: Option<String>) -> Result<Self> {
        Self::new(&config.base_url, model, api_key, config.timeout_secs)
    }

    /// Get the model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build headers for a request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(api_key) = &self.api_key {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    /// Score a batch against the remote model.
    pub async fn predict(&self, tasks: &[ScoringTask], batch_size: usize) -> Result<BatchScores> {
        if tasks.is_empty() {
            return Err(OracleError::EmptyBatch.into());
        }

        let start = Instant::now();
        let url = format!("{}/predict", self.base_url);
        let request = PredictRequest {
            model: &self.model,
            batch_size,
            data: tasks,
        };

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PrefsError::Timeout(self.timeout)
                } else {
                    PrefsError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = match status {
                401 => OracleError::AuthenticationFailed,
                404 => OracleError::ModelNotFound(self.model.clone()),
                _ => OracleError::Api {
                    status,
                    message: serde_json::from_str::<ApiErrorResponse>(&body)
                        .map(|e| e.error.message)
                        .unwrap_or(body),
                },
            };
            return Err(error.into());
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        debug!(
            model = %self.model,
            tasks = tasks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch scored"
        );

        Ok(BatchScores {
            scores: body.scores,
            system_score: body.system_score,
        })
    }

    /// Health check: ping the /health endpoint.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let url = format!("{}/health", self.base_url);

        match self
            .client
            .get(&url)
            .headers(self.headers())
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                if response.status().is_success() {
                    HealthCheckResult {
                        status: HealthStatus::Healthy,
                        latency_ms: Some(latency_ms),
                        error: None,
                    }
                } else {
                    HealthCheckResult {
                        status: HealthStatus::Unhealthy,
                        latency_ms: Some(latency_ms),
                        error: Some(format!("HTTP {}", response.status().as_u16())),
                    }
                }
            }
            Err(e) => HealthCheckResult {
                status: HealthStatus::Unreachable,
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[async_trait]
impl ScoringOracle for CometClient {
    async fn score(&self, tasks: &[ScoringTask], batch_size: usize) -> Result<BatchScores> {
        self.predict(tasks, batch_size).await
    }
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Health status
    pub status: HealthStatus,
    /// Latency in milliseconds (if reachable)
    pub latency_ms: Option<u64>,
    /// Error message (if unhealthy or unreachable)
    pub error: Option<String>,
}

/// Health status of the scoring service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Service is responding normally
    Healthy,
    /// Service is responding but with errors
    Unhealthy,
    /// Service is not reachable
    Unreachable,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Unreachable => write!(f, "unreachable"),
        }
    }
}
