use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ServiceCore;
use crate::dto::{AccountInput, ContactInput, ContactPatch};
use crate::error::AppResult;
use crate::health::HealthScoreCalculator;
use crate::storage::{Account, Contact, HealthScore, SqliteStorage, Storage};

/// A contact together with the score computed for the write, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactWrite {
    /// The stored contact.
    pub contact: Contact,
    /// Score computed after the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthScore>,
}

/// Contact and account records.
///
/// Creating a contact, or changing its account, email or phone, triggers a
/// health recalculation when enabled. A failed recalculation is logged and
/// does not undo the write.
pub struct ContactService {
    core: ServiceCore,
    health: HealthScoreCalculator<SqliteStorage>,
    recalc_on_update: bool,
}

impl ContactService {
    /// Create the service. `recalc_on_update` enables health recalculation
    /// on create and on key field changes.
    pub fn new(core: ServiceCore, recalc_on_update: bool) -> Self {
        let health = HealthScoreCalculator::new(core.storage().clone());
        Self {
            core,
            health,
            recalc_on_update,
        }
    }

    /// Validate and store a new account.
    pub async fn create_account(&self, input: AccountInput, now: DateTime<Utc>) -> AppResult<Account> {
        let account = input.validate()?.into_record(now);
        self.core.storage().create_account(&account).await?;

        info!(account_id = %account.id, name = %account.name, "Account created");
        Ok(account)
    }

    /// Load an account.
    pub async fn get_account(&self, id: &str) -> AppResult<Account> {
        self.core.require_account(id).await
    }

    /// Validate and store a new contact.
    pub async fn create(&self, input: ContactInput, now: DateTime<Utc>) -> AppResult<ContactWrite> {
        let contact = input.validate()?.into_record(now);
        self.core.check_refs(contact.account_id.as_ref(), None).await?;
        self.core.storage().create_contact(&contact).await?;

        info!(contact_id = %contact.id, "Contact created");

        let health = self.recalculate(&contact, now).await;
        Ok(ContactWrite { contact, health })
    }

    /// Load a contact.
    pub async fn get(&self, id: &str) -> AppResult<Contact> {
        self.core.require_contact(id).await
    }

    /// Apply a partial update.
    pub async fn update(
        &self,
        id: &str,
        patch: ContactPatch,
        now: DateTime<Utc>,
    ) -> AppResult<ContactWrite> {
        let patch = patch.validate()?;
        let mut contact = self.get(id).await?;
        if let Some(Some(account_id)) = &patch.account_id {
            self.core.require_account(account_id).await?;
        }

        let key_changed = patch.apply(&mut contact, now);
        self.core.storage().update_contact(&contact).await?;

        info!(contact_id = %contact.id, key_changed, "Contact updated");

        let health = if key_changed {
            self.recalculate(&contact, now).await
        } else {
            None
        };
        Ok(ContactWrite { contact, health })
    }

    async fn recalculate(&self, contact: &Contact, now: DateTime<Utc>) -> Option<HealthScore> {
        if !self.recalc_on_update {
            return None;
        }
        match self.health.calculate(contact, now).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!(contact_id = %contact.id, error = %e, "Health recalculation failed");
                None
            }
        }
    }
}
