use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::ServiceCore;
use crate::dto::{ActivityInput, QuoteInput, SessionInput};
use crate::error::{AppError, AppResult};
use crate::storage::{Activity, ActivitySession, Quote, Storage};

/// Activity log, quotes and tracked sessions.
#[derive(Clone)]
pub struct ActivityService {
    core: ServiceCore,
}

impl ActivityService {
    /// Create an activity service.
    pub fn new(core: ServiceCore) -> Self {
        Self { core }
    }

    /// Log a task, call, meeting, note, email or generic activity.
    pub async fn log(&self, input: ActivityInput, now: DateTime<Utc>) -> AppResult<Activity> {
        let activity = input.validate()?.into_record(now);
        self.core
            .check_refs(None, activity.contact_id.as_ref())
            .await?;
        self.core.storage().create_activity(&activity).await?;

        info!(activity_id = %activity.id, kind = %activity.kind, "Activity logged");
        Ok(activity)
    }

    /// Activities for a contact, newest first.
    pub async fn for_contact(&self, contact_id: &str) -> AppResult<Vec<Activity>> {
        self.core.require_contact(contact_id).await?;
        Ok(self
            .core
            .storage()
            .list_contact_activities(contact_id)
            .await?)
    }

    /// Validate and store a quote, checking its opportunity exists.
    pub async fn create_quote(&self, input: QuoteInput, now: DateTime<Utc>) -> AppResult<Quote> {
        let quote = input.validate()?.into_record(now);
        if let Some(opportunity_id) = &quote.opportunity_id {
            self.core
                .storage()
                .get_opportunity(opportunity_id)
                .await?
                .ok_or_else(|| AppError::not_found("Opportunity", opportunity_id.as_str()))?;
        }
        self.core.storage().create_quote(&quote).await?;

        info!(quote_id = %quote.id, total = quote.total, "Quote created");
        Ok(quote)
    }

    /// Fetch a quote by id.
    pub async fn get_quote(&self, id: &str) -> AppResult<Quote> {
        self.core
            .storage()
            .get_quote(id)
            .await?
            .ok_or_else(|| AppError::not_found("Quote", id))
    }

    /// Record a tracked website visit.
    pub async fn record_session(
        &self,
        input: SessionInput,
        now: DateTime<Utc>,
    ) -> AppResult<ActivitySession> {
        let session = input.validate()?.into_record(now);
        self.core
            .check_refs(None, session.contact_id.as_ref())
            .await?;
        self.core.storage().record_session(&session).await?;

        debug!(session_id = %session.id, visitor_id = %session.visitor_id, "Session recorded");
        Ok(session)
    }
}
