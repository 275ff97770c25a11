use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{Sentiment, SentimentAnalyzer};
use crate::config::SentimentConfig;
use crate::error::{SentimentError, SentimentResult};

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

/// HTTP client for the sentiment analysis endpoint.
///
/// Single attempt per call: enrichment is best-effort, so a slow or failing
/// endpoint is reported to the caller instead of retried.
#[derive(Clone)]
pub struct HttpSentimentClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpSentimentClient {
    /// Create a client posting to `url`.
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
    ) -> SentimentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(SentimentError::Http)?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
            timeout_ms,
        })
    }

    /// Build from configuration. `None` when no endpoint is configured.
    pub fn from_config(config: &SentimentConfig) -> SentimentResult<Option<Self>> {
        config
            .api_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.api_key.clone(), config.timeout_ms))
            .transpose()
    }
}

#[async_trait]
impl SentimentAnalyzer for HttpSentimentClient {
    async fn analyze(&self, text: &str) -> SentimentResult<Sentiment> {
        let start = Instant::now();
        debug!(chars = text.len(), "Requesting sentiment analysis");

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&AnalyzeRequest { text });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SentimentError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                SentimentError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SentimentError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let sentiment: Sentiment =
            response
                .json()
                .await
                .map_err(|e| SentimentError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        info!(
            label = %sentiment.label,
            score = sentiment.score,
            latency_ms = start.elapsed().as_millis(),
            "Sentiment analysis succeeded"
        );
        Ok(sentiment)
    }
}
