use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::storage::ActivitySession;

/// A tracked website visit as reported by the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInput {
    /// Tracker visitor id.
    pub visitor_id: Option<String>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Related lead.
    pub lead_id: Option<String>,
    /// Pages viewed in the visit.
    pub page_views: Option<i64>,
    /// Visit length in seconds.
    pub duration_seconds: Option<i64>,
    /// Defaults to the time of recording.
    pub started_at: Option<DateTime<Utc>>,
}

/// A session input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSession {
    /// Tracker visitor id.
    pub visitor_id: String,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Related lead.
    pub lead_id: Option<String>,
    /// Pages viewed in the visit.
    pub page_views: i64,
    /// Visit length in seconds.
    pub duration_seconds: i64,
    /// When the visit began.
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidSession, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let visitor_id = errors.require("visitor_id", self.visitor_id);
        let page_views = self.page_views.unwrap_or(1);
        errors.non_negative("page_views", page_views as f64);
        let duration_seconds = self.duration_seconds.unwrap_or(0);
        errors.non_negative("duration_seconds", duration_seconds as f64);

        let valid = visitor_id.map(|visitor_id| ValidSession {
            visitor_id,
            contact_id: non_blank(self.contact_id),
            lead_id: non_blank(self.lead_id),
            page_views,
            duration_seconds,
            started_at: self.started_at,
        });
        errors.finish(valid)
    }
}

impl ValidSession {
    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> ActivitySession {
        let mut session = ActivitySession::new(self.visitor_id, self.started_at.unwrap_or(now))
            .with_engagement(self.page_views, self.duration_seconds);
        session.contact_id = self.contact_id;
        session.lead_id = self.lead_id;
        session
    }
}
