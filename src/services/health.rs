use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ServiceCore;
use crate::error::AppResult;
use crate::health::HealthScoreCalculator;
use crate::storage::{HealthScore, SqliteStorage, Storage};

/// Default number of scores returned by [`HealthService::history`].
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

/// A contact whose recalculation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalcFailure {
    /// Contact that failed.
    pub contact_id: String,
    /// Error message.
    pub error: String,
}

/// Outcome of a batch recalculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecalcSummary {
    /// Contacts attempted.
    pub processed: usize,
    /// Contacts scored.
    pub succeeded: usize,
    /// Contacts that failed, with the reason.
    pub failures: Vec<RecalcFailure>,
}

/// On-demand and batch health scoring.
pub struct HealthService {
    core: ServiceCore,
    calculator: HealthScoreCalculator<SqliteStorage>,
}

impl HealthService {
    /// Create a health service over the core's storage.
    pub fn new(core: ServiceCore) -> Self {
        let calculator = HealthScoreCalculator::new(core.storage().clone());
        Self { core, calculator }
    }

    /// Compute and store a fresh score for one contact.
    pub async fn calculate(&self, contact_id: &str, now: DateTime<Utc>) -> AppResult<HealthScore> {
        let contact = self.core.require_contact(contact_id).await?;
        self.calculator.calculate(&contact, now).await
    }

    /// Stored scores for a contact, newest first.
    pub async fn history(&self, contact_id: &str, limit: Option<u32>) -> AppResult<Vec<HealthScore>> {
        self.core.require_contact(contact_id).await?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        Ok(self
            .core
            .storage()
            .get_health_history(contact_id, limit)
            .await?)
    }

    /// Recalculate every contact. One contact failing does not stop the rest.
    pub async fn recalculate_all(&self, now: DateTime<Utc>) -> AppResult<RecalcSummary> {
        let ids = self.core.storage().list_contact_ids().await?;
        let mut summary = RecalcSummary::default();

        for id in ids {
            summary.processed += 1;
            match self.calculate(&id, now).await {
                Ok(_) => summary.succeeded += 1,
                Err(e) => {
                    warn!(contact_id = %id, error = %e, "Batch health recalculation failed");
                    summary.failures.push(RecalcFailure {
                        contact_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failures.len(),
            "Batch health recalculation complete"
        );
        Ok(summary)
    }
}
