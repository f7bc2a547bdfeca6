//! Prediction client
//!
//! One operation: POST an encoded image to `<base_url>/predict` and get back
//! a validated [`PredictionResult`]. Every failure, whatever its cause,
//! reaches the caller as a single [`PredictionError`]; the cause is kept for
//! logging only.

pub mod schema;

pub use schema::{PredictResponse, PredictionResult};

use crate::image::ImagePayload;
use schema::PredictRequest;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("retiscan/", env!("CARGO_PKG_VERSION"));

/// Why an analysis failed (diagnostic only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Transport,
    Timeout,
    Status(u16),
    Malformed,
}

/// Generic analysis failure
#[derive(Debug, Error)]
#[error("Analysis failed")]
pub struct PredictionError {
    pub cause: FailureCause,
    pub detail: String,
}

impl PredictionError {
    fn new(cause: FailureCause, detail: impl Into<String>) -> Self {
        Self { cause, detail: detail.into() }
    }
}

/// Remote classifier seam
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    async fn submit(&self, image: &ImagePayload) -> Result<PredictionResult, PredictionError>;
}

/// HTTP client for the `/predict` endpoint
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpPredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictionError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::new(FailureCause::Transport, e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/predict", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Predictor for HttpPredictionClient {
    async fn submit(&self, image: &ImagePayload) -> Result<PredictionResult, PredictionError> {
        let started = Instant::now();
        debug!(endpoint = %self.endpoint, bytes = image.byte_len(), "Submitting image for analysis");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&PredictRequest { image: image.data_url() })
            .send()
            .await
            .map_err(|e| {
                let cause = if e.is_timeout() { FailureCause::Timeout } else { FailureCause::Transport };
                warn!(?cause, error = %e, "Prediction request failed");
                PredictionError::new(cause, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Prediction service returned an error");
            return Err(PredictionError::new(FailureCause::Status(status.as_u16()), body));
        }

        let raw: PredictResponse = response.json().await.map_err(|e| {
            let cause = if e.is_timeout() { FailureCause::Timeout } else { FailureCause::Malformed };
            warn!(?cause, error = %e, "Unreadable prediction response");
            PredictionError::new(cause, e.to_string())
        })?;

        let result = raw.validate().map_err(|reason| {
            warn!(%reason, "Prediction response failed validation");
            PredictionError::new(FailureCause::Malformed, reason)
        })?;

        info!(
            class = result.class.index(),
            confidence = result.confidence(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_path() {
        let client = HttpPredictionClient::new("http://127.0.0.1:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:5000/predict");
    }

    #[test]
    fn test_error_message_is_generic() {
        let err = PredictionError::new(FailureCause::Status(500), "Traceback ...");
        assert_eq!(err.to_string(), "Analysis failed");
        assert_eq!(err.cause, FailureCause::Status(500));
    }
}
