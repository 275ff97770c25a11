//! Metrics that come from systems outside the record store.
//!
//! No source is wired up yet, so every figure is optional and the default
//! source reports them all as unavailable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::storage::DateRange;

/// Figures the record store cannot compute on its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetrics {
    /// Customer satisfaction score (survey tool).
    pub customer_satisfaction: Option<f64>,
    /// Mean first response time in minutes (helpdesk).
    pub average_response_minutes: Option<f64>,
    /// Knowledge base article views (docs site).
    pub kb_article_views: Option<i64>,
    /// Marketing email open rate in percent (mail platform).
    pub email_open_rate: Option<f64>,
}

/// Provider of [`ExternalMetrics`] for a date range.
#[async_trait]
pub trait ExternalMetricsSource: Send + Sync {
    /// Metrics covering `range`. Missing figures stay `None`.
    async fn fetch(&self, range: &DateRange) -> ExternalMetrics;
}

/// Source that has nothing to report.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableMetrics;

#[async_trait]
impl ExternalMetricsSource for UnavailableMetrics {
    async fn fetch(&self, _range: &DateRange) -> ExternalMetrics {
        ExternalMetrics::default()
    }
}
