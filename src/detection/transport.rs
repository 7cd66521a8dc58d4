use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClassificationError;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One POST per call. Failures without an HTTP response map to
/// `ClassificationError::Transport`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, ClassificationError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ClassificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassificationError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, ClassificationError> {
        // The URL carries the API key, keep it out of error messages.
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ClassificationError::Transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            // The status alone drives retry and failure handling.
            let body = response.text().await.unwrap_or_default();
            return Ok(HttpResponse { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassificationError::Transport(e.without_url().to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
