use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

use crate::{
    config::ClassifierConfig,
    detection::{
        Classifier, ClassificationVerdict,
        request::{GenerateContentRequest, parse_verdict},
        transport::{HttpTransport, ReqwestTransport},
    },
    error::ClassificationError,
    raster::SourceImage,
};

const TOO_MANY_REQUESTS: u16 = 429;

pub struct ClassificationClient {
    config: ClassifierConfig,
    transport: Arc<dyn HttpTransport>,
}

impl ClassificationClient {
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassificationError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClassifierConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// POSTs `body`, retrying only on HTTP 429.
    ///
    /// Attempt `n` that is rate limited waits `2^n * base + jitter` before
    /// attempt `n + 1`; a 429 on the last allowed attempt yields
    /// `RetriesExhausted`. Other statuses and transport failures are returned
    /// immediately.
    pub async fn fetch_with_backoff(&self, body: &Value) -> Result<String, ClassificationError> {
        let url = self.config.generate_url();
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            debug!("Classification attempt {}/{}", attempt, policy.max_attempts);
            let response = self.transport.post_json(&url, body).await?;

            if response.is_success() {
                return Ok(response.body);
            }

            if response.status != TOO_MANY_REQUESTS {
                warn!("Classification API returned status {}", response.status);
                return Err(ClassificationError::HttpStatus(response.status));
            }

            if attempt >= policy.max_attempts {
                warn!("Classification API still rate limited after {} attempts", attempt);
                return Err(ClassificationError::RetriesExhausted { attempts: attempt });
            }

            let jitter = rand::random_range(0..policy.max_jitter_ms.max(1));
            let delay = policy.delay_for(attempt, jitter);
            warn!(
                "Classification API rate limited (attempt {}), retrying in {} ms",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Classifier for ClassificationClient {
    async fn classify(&self, image: &SourceImage) -> Result<ClassificationVerdict, ClassificationError> {
        let request = GenerateContentRequest::for_image(image);
        let body = serde_json::to_value(&request)
            .map_err(|e| ClassificationError::Transport(format!("encoding request: {}", e)))?;

        let response_body = self.fetch_with_backoff(&body).await?;
        let verdict = parse_verdict(&response_body)?;

        info!(
            "Classification verdict: is_ai={}, confidence={}",
            verdict.is_ai, verdict.confidence
        );

        Ok(verdict)
    }

    fn name(&self) -> &str {
        "remote-classifier"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::detection::{
        testing::{ScriptedTransport, jpeg_source, status, success_body},
        transport::HttpResponse,
    };

    fn client(transport: Arc<ScriptedTransport>) -> ClassificationClient {
        let config = ClassifierConfig::default()
            .with_api_key("test-key")
            .with_endpoint("https://example.invalid/v1beta");
        ClassificationClient::with_transport(config, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_once_after_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            status(429),
            Ok(HttpResponse {
                status: 200,
                body: success_body(true, 87),
            }),
        ]));
        let client = client(transport.clone());

        let start = tokio::time::Instant::now();
        let verdict = client.classify(&jpeg_source(16, 16)).await.unwrap();
        let elapsed = start.elapsed();

        assert!(verdict.is_ai);
        assert_eq!(verdict.confidence, 87);
        assert_eq!(transport.call_count(), 2);
        assert!(elapsed >= Duration::from_millis(2000));
        assert!(elapsed < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_windows_and_attempt_cap() {
        let transport = Arc::new(ScriptedTransport::new(vec![]).with_fallback(429));
        let client = client(transport.clone());

        let err = client.classify(&jpeg_source(8, 8)).await.unwrap_err();
        assert!(matches!(err, ClassificationError::RetriesExhausted { attempts: 5 }));
        assert_eq!(transport.call_count(), 5);

        let instants = transport.call_instants();
        for (n, pair) in instants.windows(2).enumerate() {
            let attempt = n as u32 + 1;
            let wait = pair[1] - pair[0];
            let floor = Duration::from_millis(2u64.pow(attempt) * 1000);
            assert!(wait >= floor, "attempt {} waited {:?}", attempt, wait);
            assert!(wait < floor + Duration::from_millis(1000), "attempt {} waited {:?}", attempt, wait);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_statuses_fail_immediately() {
        for code in [400u16, 401, 500, 503] {
            let transport = Arc::new(ScriptedTransport::new(vec![status(code)]));
            let client = client(transport.clone());

            let err = client.classify(&jpeg_source(8, 8)).await.unwrap_err();
            assert!(matches!(err, ClassificationError::HttpStatus(c) if c == code));
            assert_eq!(transport.call_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_after_rate_limit_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![status(429), status(503)]));
        let client = client(transport.clone());

        let err = client.classify(&jpeg_source(8, 8)).await.unwrap_err();
        assert!(matches!(err, ClassificationError::HttpStatus(503)));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(
            ClassificationError::Transport("connection refused".into()),
        )]));
        let client = client(transport.clone());

        let err = client.classify(&jpeg_source(8, 8)).await.unwrap_err();
        assert!(matches!(err, ClassificationError::Transport(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(
            HttpResponse {
                status: 200,
                body: r#"{"candidates": []}"#.into(),
            },
        )]));
        let client = client(transport);

        let err = client.classify(&jpeg_source(8, 8)).await.unwrap_err();
        assert!(matches!(err, ClassificationError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_request_targets_model_endpoint() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(
            HttpResponse {
                status: 200,
                body: success_body(false, 70),
            },
        )]));
        let client = client(transport.clone());

        let verdict = client.classify(&jpeg_source(8, 8)).await.unwrap();
        assert!(!verdict.is_ai);

        let (url, body) = transport.last_request().unwrap();
        assert_eq!(
            url,
            "https://example.invalid/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent?key=test-key"
        );
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
    }
}
