use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::storage::{Case, CasePriority, CaseStatus, CaseType};

const RESOLUTION_REQUIRED: &str = "is required when closing a case";

/// Fields accepted when opening a case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseInput {
    /// Short summary.
    pub subject: Option<String>,
    /// Full description.
    pub description: Option<String>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Defaults to `New`.
    pub status: Option<String>,
    /// Defaults to `Medium`.
    pub priority: Option<String>,
    /// Case category.
    pub case_type: Option<String>,
    /// How the case was resolved.
    pub resolution: Option<String>,
}

/// A case input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCase {
    /// Short summary.
    pub subject: String,
    /// Full description.
    pub description: Option<String>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Case status.
    pub status: CaseStatus,
    /// Case priority.
    pub priority: CasePriority,
    /// Case category.
    pub case_type: Option<CaseType>,
    /// How the case was resolved.
    pub resolution: Option<String>,
}

impl CaseInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidCase, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let subject = errors.require("subject", self.subject);
        let status = errors
            .label("status", self.status.as_deref(), &CaseStatus::labels())
            .unwrap_or(CaseStatus::New);
        let priority = errors
            .label("priority", self.priority.as_deref(), &CasePriority::labels())
            .unwrap_or(CasePriority::Medium);
        let case_type = errors.label("case_type", self.case_type.as_deref(), &CaseType::labels());
        let resolution = non_blank(self.resolution);
        if status.is_closing() && resolution.is_none() {
            errors.add("resolution", RESOLUTION_REQUIRED);
        }

        let valid = subject.map(|subject| ValidCase {
            subject,
            description: non_blank(self.description),
            contact_id: non_blank(self.contact_id),
            account_id: non_blank(self.account_id),
            status,
            priority,
            case_type,
            resolution,
        });
        errors.finish(valid)
    }
}

impl ValidCase {
    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Case {
        let mut case = Case::new(self.subject, self.priority, now).with_status(self.status, now);
        case.description = self.description;
        case.contact_id = self.contact_id;
        case.account_id = self.account_id;
        case.case_type = self.case_type;
        case.resolution = self.resolution;
        case
    }
}

/// Partial case update. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseUpdate {
    /// Short summary.
    pub subject: Option<String>,
    /// Full description.
    pub description: Option<String>,
    /// Case status.
    pub status: Option<String>,
    /// Case priority.
    pub priority: Option<String>,
    /// Case category.
    pub case_type: Option<String>,
    /// How the case was resolved.
    pub resolution: Option<String>,
}

/// A case update that passed validation against the stored case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidCaseUpdate {
    /// Short summary.
    pub subject: Option<String>,
    /// Full description.
    pub description: Option<String>,
    /// Case status.
    pub status: Option<CaseStatus>,
    /// Case priority.
    pub priority: Option<CasePriority>,
    /// Case category.
    pub case_type: Option<CaseType>,
    /// How the case was resolved.
    pub resolution: Option<String>,
}

impl CaseUpdate {
    /// Validate against `current`. Moving into a closing status needs a
    /// resolution, either in this update or already on the case.
    pub fn validate_for(self, current: &Case) -> Result<ValidCaseUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let subject = match self.subject {
            Some(raw) => errors.require("subject", Some(raw)),
            None => None,
        };
        let status: Option<CaseStatus> =
            errors.label("status", self.status.as_deref(), &CaseStatus::labels());
        let priority = errors.label("priority", self.priority.as_deref(), &CasePriority::labels());
        let case_type = errors.label("case_type", self.case_type.as_deref(), &CaseType::labels());
        let resolution = non_blank(self.resolution);

        let closing = status.map(|s| s.is_closing()).unwrap_or(false);
        if closing && resolution.is_none() && current.resolution.is_none() {
            errors.add("resolution", RESOLUTION_REQUIRED);
        }

        errors.finish(Some(ValidCaseUpdate {
            subject,
            description: non_blank(self.description),
            status,
            priority,
            case_type,
            resolution,
        }))
    }
}

impl ValidCaseUpdate {
    /// Apply onto `case`, stamping `resolved_at` when it closes.
    pub fn apply(self, case: &mut Case, now: DateTime<Utc>) {
        if let Some(v) = self.subject {
            case.subject = v;
        }
        if let Some(v) = self.description {
            case.description = Some(v);
        }
        if let Some(v) = self.priority {
            case.priority = v;
        }
        if let Some(v) = self.case_type {
            case.case_type = Some(v);
        }
        if let Some(v) = self.resolution {
            case.resolution = Some(v);
        }
        if let Some(status) = self.status {
            case.status = status;
            if status.is_closing() {
                case.resolved_at.get_or_insert(now);
            } else {
                case.resolved_at = None;
            }
        }
        case.updated_at = now;
    }
}
