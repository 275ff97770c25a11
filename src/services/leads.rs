use chrono::{DateTime, Utc};
use tracing::info;

use super::ServiceCore;
use crate::dto::{LeadInput, ValidationErrors};
use crate::error::{AppError, AppResult};
use crate::storage::{Lead, LeadStatus, Storage};

/// Lead capture and qualification.
#[derive(Clone)]
pub struct LeadService {
    core: ServiceCore,
}

impl LeadService {
    /// Create a lead service.
    pub fn new(core: ServiceCore) -> Self {
        Self { core }
    }

    /// Validate and store a new lead.
    pub async fn create(&self, input: LeadInput, now: DateTime<Utc>) -> AppResult<Lead> {
        let lead = input.validate()?.into_record(now);
        self.core.storage().create_lead(&lead).await?;

        info!(lead_id = %lead.id, status = %lead.status, "Lead created");
        Ok(lead)
    }

    /// Fetch a lead by id.
    pub async fn get(&self, id: &str) -> AppResult<Lead> {
        self.core
            .storage()
            .get_lead(id)
            .await?
            .ok_or_else(|| AppError::not_found("Lead", id))
    }

    /// Move a lead to `status`. Converting needs the resulting contact.
    pub async fn update_status(
        &self,
        id: &str,
        status: &str,
        converted_contact_id: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Lead> {
        let mut errors = ValidationErrors::new();
        let status: Option<LeadStatus> =
            errors.label("status", Some(status), &LeadStatus::labels());
        if status.is_none() && errors.is_empty() {
            errors.add("status", "is required");
        }
        if status == Some(LeadStatus::Converted) && converted_contact_id.is_none() {
            errors.add("converted_contact_id", "is required when converting a lead");
        }
        let status = errors.finish(status)?;

        let mut lead = self.get(id).await?;
        if let Some(contact_id) = &converted_contact_id {
            self.core.require_contact(contact_id).await?;
        }

        let previous = lead.status;
        lead.status = status;
        if converted_contact_id.is_some() {
            lead.converted_contact_id = converted_contact_id;
        }
        lead.updated_at = now;
        self.core.storage().update_lead(&lead).await?;

        info!(lead_id = %lead.id, from = %previous, to = %lead.status, "Lead status updated");
        Ok(lead)
    }
}
