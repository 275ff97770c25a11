//! Storage layer for CRM records, health snapshots and aggregates.
//!
//! Three ports are defined here: [`Storage`] for record CRUD, [`HealthQuery`]
//! for the reads and the guarded insert behind health scoring, and
//! [`AnalyticsQuery`] for count/sum/avg primitives. [`SqliteStorage`]
//! implements all of them.

mod aggregate;
mod records;
mod sqlite;


pub use aggregate::{
    AggregateQuery, Condition, DataPoint, DateField, DateRange, Entity, Field, Measure,
    MAX_RANGE_DAYS,
};
pub use records::{
    Account, Activity, ActivityKind, ActivitySession, Case, CaseCounts, CasePriority, CaseStatus,
    CaseType, Contact, HealthFactors, HealthScore, Invocation, Lead, LeadSource, LeadStatus,
    Opportunity, ParentType, Quote, QuoteLineItem, QuoteStage, RiskLevel, Trend,
};
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;

/// Record persistence.
///
/// Getters return `Ok(None)` on a miss; updates return
/// `StorageError::NotFound` when no row matched.
#[async_trait]
pub trait Storage: Send + Sync {
    // Account operations

    /// Create a new account.
    async fn create_account(&self, account: &Account) -> StorageResult<()>;
    /// Get an account by ID.
    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>>;

    // Contact operations

    /// Create a new contact.
    async fn create_contact(&self, contact: &Contact) -> StorageResult<()>;
    /// Get a contact by ID.
    async fn get_contact(&self, id: &str) -> StorageResult<Option<Contact>>;
    /// Overwrite an existing contact.
    async fn update_contact(&self, contact: &Contact) -> StorageResult<()>;
    /// IDs of every contact, oldest first.
    async fn list_contact_ids(&self) -> StorageResult<Vec<String>>;

    // Lead operations

    /// Create a new lead.
    async fn create_lead(&self, lead: &Lead) -> StorageResult<()>;
    /// Get a lead by ID.
    async fn get_lead(&self, id: &str) -> StorageResult<Option<Lead>>;
    /// Overwrite an existing lead.
    async fn update_lead(&self, lead: &Lead) -> StorageResult<()>;

    // Opportunity operations

    /// Create a new opportunity.
    async fn create_opportunity(&self, opportunity: &Opportunity) -> StorageResult<()>;
    /// Get an opportunity by ID.
    async fn get_opportunity(&self, id: &str) -> StorageResult<Option<Opportunity>>;
    /// Overwrite an existing opportunity.
    async fn update_opportunity(&self, opportunity: &Opportunity) -> StorageResult<()>;
    /// Opportunities not in a closed stage.
    async fn list_open_opportunities(&self) -> StorageResult<Vec<Opportunity>>;

    // Case operations

    /// Create a new case.
    async fn create_case(&self, case: &Case) -> StorageResult<()>;
    /// Get a case by ID.
    async fn get_case(&self, id: &str) -> StorageResult<Option<Case>>;
    /// Overwrite an existing case.
    async fn update_case(&self, case: &Case) -> StorageResult<()>;

    // Activity operations

    /// Log an activity.
    async fn create_activity(&self, activity: &Activity) -> StorageResult<()>;
    /// Activities for a contact, newest first.
    async fn list_contact_activities(&self, contact_id: &str) -> StorageResult<Vec<Activity>>;

    // Quote operations

    /// Create a new quote.
    async fn create_quote(&self, quote: &Quote) -> StorageResult<()>;
    /// Get a quote by ID.
    async fn get_quote(&self, id: &str) -> StorageResult<Option<Quote>>;

    // Session tracking

    /// Record a website session.
    async fn record_session(&self, session: &ActivitySession) -> StorageResult<()>;

    // Health history

    /// Most recent health scores for a contact, newest first.
    async fn get_health_history(
        &self,
        contact_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<HealthScore>>;

    // Invocation logging

    /// Record a tool invocation.
    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()>;
}

/// Reads and writes behind health scoring.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthQuery: Send + Sync {
    /// Sessions attributed to the contact starting at or after `since`.
    async fn count_contact_sessions_since(
        &self,
        contact_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<i64>;

    /// Cases opened by the contact at or after `since`, and how many of
    /// those are resolved.
    async fn count_cases_since(
        &self,
        contact_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<CaseCounts>;

    /// Whether the account has more than one contact.
    async fn has_account_multiple_contacts(&self, account_id: &str) -> StorageResult<bool>;

    /// The contact's newest health score.
    async fn latest_health_score(&self, contact_id: &str) -> StorageResult<Option<HealthScore>>;

    /// Insert a new score.
    ///
    /// Fails with `StorageError::Conflict` unless `score.supersedes_id` is
    /// the id of the contact's current latest score (or `None` when the
    /// contact has no score yet).
    async fn insert_health_score(&self, score: &HealthScore) -> StorageResult<()>;
}

/// Aggregate primitives over [`AggregateQuery`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsQuery: Send + Sync {
    /// Number of matching records.
    async fn count(&self, query: &AggregateQuery) -> StorageResult<i64>;

    /// Number of distinct non-null `field` values among matching records.
    async fn count_distinct(&self, query: &AggregateQuery, field: Field) -> StorageResult<i64>;

    /// Matching record counts grouped by `field` value.
    async fn count_by(
        &self,
        query: &AggregateQuery,
        field: Field,
    ) -> StorageResult<Vec<(String, i64)>>;

    /// Sum of `measure`, 0 when nothing matches.
    async fn sum(&self, query: &AggregateQuery, measure: Measure) -> StorageResult<f64>;

    /// Mean of `measure`, `None` when nothing matches.
    async fn avg(&self, query: &AggregateQuery, measure: Measure) -> StorageResult<Option<f64>>;

    /// Timestamp and value of each matching record, oldest first. The value
    /// is 1.0 when `measure` is `None`.
    async fn points(
        &self,
        query: &AggregateQuery,
        measure: Option<Measure>,
    ) -> StorageResult<Vec<DataPoint>>;
}
