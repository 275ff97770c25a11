//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::analytics::AnalyticsAggregator;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::sentiment::SentimentAnalyzer;
use crate::services::{
    ActivityService, CaseService, ContactService, HealthService, LeadService, OpportunityService,
    ServiceCore,
};
use crate::storage::{Invocation, SqliteStorage, Storage};

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend.
    pub storage: SqliteStorage,
    /// Lead service.
    pub leads: LeadService,
    /// Contact and account service.
    pub contacts: ContactService,
    /// Opportunity and pipeline service.
    pub opportunities: OpportunityService,
    /// Support case service.
    pub cases: CaseService,
    /// Activities, quotes and sessions.
    pub activities: ActivityService,
    /// Health scoring service.
    pub health: HealthService,
    /// Dashboard analytics.
    pub analytics: AnalyticsAggregator<SqliteStorage>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Case sentiment enrichment is enabled when `sentiment` is given.
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    ) -> Self {
        tracing::info!(
            recalc_on_update = config.health.recalc_on_update,
            sentiment = sentiment.is_some(),
            default_range_days = config.analytics.default_range_days,
            "AppState initializing"
        );

        let core = match sentiment {
            Some(analyzer) => ServiceCore::new(storage.clone()).with_sentiment(analyzer),
            None => ServiceCore::new(storage.clone()),
        };

        Self {
            leads: LeadService::new(core.clone()),
            contacts: ContactService::new(core.clone(), config.health.recalc_on_update),
            opportunities: OpportunityService::new(core.clone()),
            cases: CaseService::new(core.clone()),
            activities: ActivityService::new(core.clone()),
            health: HealthService::new(core),
            analytics: AnalyticsAggregator::new(storage.clone(), config.analytics.clone()),
            clock: Arc::new(SystemClock),
            config,
            storage,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The current instant according to the configured clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Store an invocation audit record. Failures are logged, not returned.
    pub async fn record_invocation(&self, invocation: &Invocation) {
        if let Err(e) = self.storage.log_invocation(invocation).await {
            warn!(
                tool = %invocation.tool_name,
                error = %e,
                "Failed to record invocation"
            );
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
