use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_blank, ValidationErrors};
use crate::storage::Account;

/// Fields accepted when creating an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInput {
    /// Company name.
    pub name: Option<String>,
    /// Industry sector.
    pub industry: Option<String>,
    /// Company website.
    pub website: Option<String>,
}

/// An account input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidAccount {
    /// Company name.
    pub name: String,
    /// Industry sector.
    pub industry: Option<String>,
    /// Company website.
    pub website: Option<String>,
}

impl AccountInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidAccount, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.require("name", self.name);
        let website = non_blank(self.website);
        if let Some(site) = &website {
            if !(site.starts_with("http://") || site.starts_with("https://")) {
                errors.add("website", "must start with http:// or https://");
            }
        }

        let valid = name.map(|name| ValidAccount {
            name,
            industry: non_blank(self.industry),
            website,
        });
        errors.finish(valid)
    }
}

impl ValidAccount {
    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Account {
        let mut account = Account::new(self.name, now);
        account.industry = self.industry;
        account.website = self.website;
        account
    }
}
