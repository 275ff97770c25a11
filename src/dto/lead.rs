use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::storage::{Lead, LeadSource, LeadStatus};

/// Fields accepted when creating a lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadInput {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Company the lead works for.
    pub company: Option<String>,
    /// Defaults to `New`.
    pub status: Option<String>,
    /// Lead source.
    pub source: Option<String>,
    /// 0-100.
    pub score: Option<i64>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
}

/// A lead input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidLead {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Company the lead works for.
    pub company: Option<String>,
    /// Lead status.
    pub status: LeadStatus,
    /// Lead source.
    pub source: Option<LeadSource>,
    /// Lead score, 0-100.
    pub score: Option<u8>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
}

impl LeadInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidLead, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let last_name = errors.require("last_name", self.last_name);
        let email = non_blank(self.email);
        errors.email("email", email.as_deref());
        let status = errors
            .label("status", self.status.as_deref(), &LeadStatus::labels())
            .unwrap_or(LeadStatus::New);
        let source = errors.label("source", self.source.as_deref(), &LeadSource::labels());
        if let Some(score) = self.score {
            errors.range("score", score as f64, 0.0, 100.0);
        }

        let valid = last_name.map(|last_name| ValidLead {
            first_name: non_blank(self.first_name),
            last_name,
            email,
            phone: non_blank(self.phone),
            company: non_blank(self.company),
            status,
            source,
            score: self.score.map(|s| s.clamp(0, 100) as u8),
            assigned_user_id: non_blank(self.assigned_user_id),
        });
        errors.finish(valid)
    }
}

impl ValidLead {
    /// Map onto a new lead record.
    pub fn into_record(self, now: DateTime<Utc>) -> Lead {
        let mut lead = Lead::new(self.last_name, now).with_status(self.status);
        lead.first_name = self.first_name;
        lead.email = self.email;
        lead.phone = self.phone;
        lead.company = self.company;
        lead.source = self.source;
        lead.score = self.score;
        lead.assigned_user_id = self.assigned_user_id;
        lead
    }
}
