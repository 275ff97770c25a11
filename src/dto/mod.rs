//! Input validation for record writes.
//!
//! Every input type is checked in two steps. `validate` turns raw caller
//! input into a typed `Valid*` value or a [`ValidationErrors`] map holding
//! every violation found, and `into_record` maps the valid value onto a
//! storage record. Neither step touches storage.

mod account;
mod activity;
mod case;
mod contact;
mod lead;
mod opportunity;
mod quote;
mod session;

pub use account::{AccountInput, ValidAccount};
pub use activity::{
    ActivityInput, CallStatus, Direction, EmailStatus, TaskPriority, TaskStatus, ValidActivity,
};
pub use case::{CaseInput, CaseUpdate, ValidCase, ValidCaseUpdate};
pub use contact::{ContactInput, ContactPatch, ValidContact, ValidContactPatch};
pub use lead::{LeadInput, ValidLead};
pub use opportunity::{OpportunityInput, StageChange, ValidOpportunity, ValidStageChange};
pub use quote::{QuoteInput, QuoteLineInput, ValidQuote};
pub use session::{SessionInput, ValidSession};

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field → messages for every rule an input broke.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// An empty error map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation on `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Whether no violations were recorded.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields with violations.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Messages recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Fields with violations, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Trimmed `value`, or a violation when it is missing or blank.
    pub(crate) fn require(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match non_blank(value) {
            Some(v) => Some(v),
            None => {
                self.add(field, "is required");
                None
            }
        }
    }

    /// Parse a label when present. Unknown labels are violations.
    pub(crate) fn label<T>(&mut self, field: &str, raw: Option<&str>, accepted: &str) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.add(field, format!("must be one of: {}", accepted));
                None
            }
        }
    }

    /// Check `min <= value <= max`.
    pub(crate) fn range(&mut self, field: &str, value: f64, min: f64, max: f64) {
        if !(min..=max).contains(&value) {
            self.add(field, format!("must be between {} and {}", min, max));
        }
    }

    /// Check `value >= 0`.
    pub(crate) fn non_negative(&mut self, field: &str, value: f64) {
        if value.is_nan() || value < 0.0 {
            self.add(field, "must not be negative");
        }
    }

    /// Check a plausible email address when one is given.
    pub(crate) fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(email) = value {
            let valid = email
                .split_once('@')
                .map(|(user, domain)| !user.is_empty() && domain.contains('.'))
                .unwrap_or(false);
            if !valid {
                self.add(field, "must be a valid email address");
            }
        }
    }

    /// `Ok(value)` when nothing was recorded, else the collected errors.
    pub(crate) fn finish<T>(self, value: Option<T>) -> Result<T, ValidationErrors> {
        match value {
            Some(v) if self.is_empty() => Ok(v),
            _ => Err(self),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Trimmed value, `None` when missing or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
