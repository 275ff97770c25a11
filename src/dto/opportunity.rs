use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::pipeline::{resolve_probability, SalesStage};
use crate::storage::Opportunity;

/// Fields accepted when creating an opportunity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpportunityInput {
    /// Display name.
    pub name: Option<String>,
    /// Deal value.
    pub amount: Option<f64>,
    /// Pipeline stage.
    pub sales_stage: Option<String>,
    /// Overrides the stage default when given (0-100).
    pub probability: Option<i64>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Expected or actual close date.
    pub date_closed: Option<DateTime<Utc>>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
}

/// An opportunity input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOpportunity {
    /// Display name.
    pub name: String,
    /// Deal value.
    pub amount: f64,
    /// Pipeline stage.
    pub sales_stage: SalesStage,
    /// Win probability, 0-100. Defaults to the stage value.
    pub probability: Option<u8>,
    /// Owning account.
    pub account_id: Option<String>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Expected or actual close date.
    pub date_closed: Option<DateTime<Utc>>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
}

fn check_probability(errors: &mut ValidationErrors, probability: Option<i64>) -> Option<u8> {
    let p = probability?;
    errors.range("probability", p as f64, 0.0, 100.0);
    Some(p.clamp(0, 100) as u8)
}

impl OpportunityInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidOpportunity, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.require("name", self.name);
        let amount = match self.amount {
            Some(a) => {
                errors.non_negative("amount", a);
                Some(a)
            }
            None => {
                errors.add("amount", "is required");
                None
            }
        };
        let sales_stage = match non_blank(self.sales_stage) {
            Some(raw) => errors.label("sales_stage", Some(&raw), &SalesStage::labels()),
            None => {
                errors.add("sales_stage", "is required");
                None
            }
        };
        let probability = check_probability(&mut errors, self.probability);

        let valid = match (name, amount, sales_stage) {
            (Some(name), Some(amount), Some(sales_stage)) => Some(ValidOpportunity {
                name,
                amount,
                sales_stage,
                probability,
                account_id: non_blank(self.account_id),
                contact_id: non_blank(self.contact_id),
                date_closed: self.date_closed,
                assigned_user_id: non_blank(self.assigned_user_id),
            }),
            _ => None,
        };
        errors.finish(valid)
    }
}

impl ValidOpportunity {
    /// Map onto a new record. Probability comes from the stage unless given.
    pub fn into_record(self, now: DateTime<Utc>) -> Opportunity {
        let mut opp = Opportunity::new(self.name, self.sales_stage, self.amount, now);
        opp.probability = resolve_probability(self.sales_stage, self.probability);
        opp.account_id = self.account_id;
        opp.contact_id = self.contact_id;
        opp.date_closed = self.date_closed;
        opp.assigned_user_id = self.assigned_user_id;
        opp
    }
}

/// Request to move an opportunity to another stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageChange {
    /// Pipeline stage.
    pub sales_stage: Option<String>,
    /// Win probability, 0-100. Defaults to the stage value.
    pub probability: Option<i64>,
}

/// A stage change that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidStageChange {
    /// Target stage.
    pub stage: SalesStage,
    /// Win probability, 0-100. Defaults to the stage value.
    pub probability: Option<u8>,
}

impl StageChange {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidStageChange, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let stage = match non_blank(self.sales_stage) {
            Some(raw) => errors.label("sales_stage", Some(&raw), &SalesStage::labels()),
            None => {
                errors.add("sales_stage", "is required");
                None
            }
        };
        let probability = check_probability(&mut errors, self.probability);

        errors.finish(stage.map(|stage| ValidStageChange { stage, probability }))
    }
}
