use chrono::{DateTime, Utc};
use tracing::info;

use super::ServiceCore;
use crate::dto::{CaseInput, CaseUpdate};
use crate::error::{AppError, AppResult};
use crate::sentiment::enrich;
use crate::storage::{Case, Storage};

/// Support cases.
#[derive(Clone)]
pub struct CaseService {
    core: ServiceCore,
}

impl CaseService {
    /// Create a case service.
    pub fn new(core: ServiceCore) -> Self {
        Self { core }
    }

    /// Validate and store a new case, scoring its text for sentiment when an
    /// analyzer is configured.
    pub async fn create(&self, input: CaseInput, now: DateTime<Utc>) -> AppResult<Case> {
        let mut case = input.validate()?.into_record(now);
        self.core
            .check_refs(case.account_id.as_ref(), case.contact_id.as_ref())
            .await?;

        if let Some(analyzer) = self.core.sentiment() {
            let text = match &case.description {
                Some(description) => format!("{}\n{}", case.subject, description),
                None => case.subject.clone(),
            };
            if let Some(sentiment) = enrich(analyzer, &text).await {
                case.sentiment_label = Some(sentiment.label);
                case.sentiment_score = Some(sentiment.score);
            }
        }

        self.core.storage().create_case(&case).await?;

        info!(
            case_id = %case.id,
            priority = %case.priority,
            sentiment = ?case.sentiment_label,
            "Case created"
        );
        Ok(case)
    }

    /// Fetch a case by id.
    pub async fn get(&self, id: &str) -> AppResult<Case> {
        self.core
            .storage()
            .get_case(id)
            .await?
            .ok_or_else(|| AppError::not_found("Case", id))
    }

    /// Apply a partial update. Closing requires a resolution.
    pub async fn update(&self, id: &str, update: CaseUpdate, now: DateTime<Utc>) -> AppResult<Case> {
        let mut case = self.get(id).await?;
        let update = update.validate_for(&case)?;
        update.apply(&mut case, now);
        self.core.storage().update_case(&case).await?;

        info!(case_id = %case.id, status = %case.status, "Case updated");
        Ok(case)
    }
}
