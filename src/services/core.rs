//! Dependencies shared by every record service.

use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::sentiment::SentimentAnalyzer;
use crate::storage::{Account, Contact, SqliteStorage, Storage};

/// Storage backend plus the optional sentiment analyzer.
///
/// Composed into each service so they share one pool and one HTTP client.
#[derive(Clone)]
pub struct ServiceCore {
    storage: SqliteStorage,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
}

impl ServiceCore {
    /// Create a core without sentiment enrichment.
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            storage,
            sentiment: None,
        }
    }

    /// Enable sentiment enrichment.
    pub fn with_sentiment(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    /// Get a reference to the storage backend.
    #[inline]
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get the sentiment analyzer, if one is configured.
    #[inline]
    pub fn sentiment(&self) -> Option<&dyn SentimentAnalyzer> {
        self.sentiment.as_deref()
    }

    /// Load a contact or fail with `NotFound`.
    pub async fn require_contact(&self, id: &str) -> AppResult<Contact> {
        self.storage
            .get_contact(id)
            .await?
            .ok_or_else(|| AppError::not_found("Contact", id))
    }

    /// Load an account or fail with `NotFound`.
    pub async fn require_account(&self, id: &str) -> AppResult<Account> {
        self.storage
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::not_found("Account", id))
    }

    /// Check optional references before a write.
    pub async fn check_refs(
        &self,
        account_id: Option<&String>,
        contact_id: Option<&String>,
    ) -> AppResult<()> {
        if let Some(id) = account_id {
            self.require_account(id).await?;
        }
        if let Some(id) = contact_id {
            self.require_contact(id).await?;
        }
        Ok(())
    }
}
