//! Sentiment enrichment for support cases.
//!
//! Enrichment is optional and fails open: [`enrich`] logs any error and
//! returns `None` so the case write goes ahead without sentiment.

mod client;

pub use client::HttpSentimentClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SentimentResult;

/// Sentiment of a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// Label such as `positive`, `neutral` or `negative`.
    pub label: String,
    /// Polarity in [-1, 1].
    pub score: f64,
}

/// Something that can score text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Score `text`.
    async fn analyze(&self, text: &str) -> SentimentResult<Sentiment>;
}

/// Run `analyzer` over `text`, swallowing failures.
pub async fn enrich(analyzer: &dyn SentimentAnalyzer, text: &str) -> Option<Sentiment> {
    if text.trim().is_empty() {
        return None;
    }
    match analyzer.analyze(text).await {
        Ok(sentiment) => Some(Sentiment {
            score: sentiment.score.clamp(-1.0, 1.0),
            ..sentiment
        }),
        Err(e) => {
            warn!(error = %e, "Sentiment analysis failed, continuing without it");
            None
        }
    }
}
