use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::storage::{Contact, LeadSource};

/// Fields accepted when creating a contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInput {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Where the contact came from.
    pub lead_source: Option<String>,
}

/// A contact input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidContact {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Where the contact came from.
    pub lead_source: Option<LeadSource>,
}

impl ContactInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidContact, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let last_name = errors.require("last_name", self.last_name);
        let email = non_blank(self.email);
        errors.email("email", email.as_deref());
        let lead_source =
            errors.label("lead_source", self.lead_source.as_deref(), &LeadSource::labels());

        let valid = last_name.map(|last_name| ValidContact {
            first_name: non_blank(self.first_name),
            last_name,
            email,
            phone: non_blank(self.phone),
            title: non_blank(self.title),
            account_id: non_blank(self.account_id),
            lead_source,
        });
        errors.finish(valid)
    }
}

impl ValidContact {
    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Contact {
        let mut contact = Contact::new(self.last_name, now);
        contact.first_name = self.first_name;
        contact.email = self.email;
        contact.phone = self.phone;
        contact.title = self.title;
        contact.account_id = self.account_id;
        contact.lead_source = self.lead_source;
        contact
    }
}

/// Partial contact update.
///
/// Absent fields are left alone. For optional fields an empty string clears
/// the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactPatch {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Where the contact came from.
    pub lead_source: Option<String>,
}

/// A validated patch. `Some(None)` clears a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidContactPatch {
    /// Given name.
    pub first_name: Option<Option<String>>,
    /// Family name.
    pub last_name: Option<String>,
    /// Email address.
    pub email: Option<Option<String>>,
    /// Phone number.
    pub phone: Option<Option<String>>,
    /// Job title.
    pub title: Option<Option<String>>,
    /// Owning account.
    pub account_id: Option<Option<String>>,
    /// Where the contact came from.
    pub lead_source: Option<Option<LeadSource>>,
}

impl ContactPatch {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidContactPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let last_name = match self.last_name {
            Some(raw) => errors.require("last_name", Some(raw)),
            None => None,
        };
        let email = self.email.map(|raw| non_blank(Some(raw)));
        if let Some(Some(address)) = &email {
            errors.email("email", Some(address));
        }
        let lead_source = self.lead_source.map(|raw| {
            errors.label("lead_source", Some(&raw), &LeadSource::labels())
        });

        errors.finish(Some(ValidContactPatch {
            first_name: self.first_name.map(|v| non_blank(Some(v))),
            last_name,
            email,
            phone: self.phone.map(|v| non_blank(Some(v))),
            title: self.title.map(|v| non_blank(Some(v))),
            account_id: self.account_id.map(|v| non_blank(Some(v))),
            lead_source,
        }))
    }
}

impl ValidContactPatch {
    /// Apply onto `contact`. Returns whether a field that feeds health
    /// scoring (`account_id`, `email`, `phone`) changed.
    pub fn apply(self, contact: &mut Contact, now: DateTime<Utc>) -> bool {
        let mut key_changed = false;

        if let Some(v) = self.first_name {
            contact.first_name = v;
        }
        if let Some(v) = self.last_name {
            contact.last_name = v;
        }
        if let Some(v) = self.title {
            contact.title = v;
        }
        if let Some(v) = self.lead_source {
            contact.lead_source = v;
        }
        if let Some(v) = self.email {
            key_changed |= contact.email != v;
            contact.email = v;
        }
        if let Some(v) = self.phone {
            key_changed |= contact.phone != v;
            contact.phone = v;
        }
        if let Some(v) = self.account_id {
            key_changed |= contact.account_id != v;
            contact.account_id = v;
        }

        contact.updated_at = now;
        key_changed
    }
}
