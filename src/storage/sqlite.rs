use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    Account, Activity, ActivitySession, AggregateQuery, AnalyticsQuery, Case, CaseCounts,
    CaseStatus, Condition, Contact, DataPoint, Field, HealthFactors, HealthQuery, HealthScore,
    Invocation, Lead, Measure, Opportunity, Quote, Storage,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::pipeline::SalesStage;

/// Static migrator that embeds migrations at compile time
/// How long a connection waits on another writer's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if config.path.as_os_str() == ":memory:" {
            return Self::new_in_memory().await;
        }

        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create a private in-memory database.
    ///
    /// The pool holds a single connection that never expires, since the
    /// database lives only as long as that connection.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_account(&self, account: &Account) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, industry, website, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.industry)
        .bind(&account.website)
        .bind(fmt_ts(&account.created_at))
        .bind(fmt_ts(&account.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_account(&self, id: &str) -> StorageResult<Option<Account>> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, name, industry, website, created_at, updated_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn create_contact(&self, contact: &Contact) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO contacts (id, first_name, last_name, email, phone, title, account_id, lead_source, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.title)
        .bind(&contact.account_id)
        .bind(contact.lead_source.map(|s| s.as_str()))
        .bind(fmt_ts(&contact.created_at))
        .bind(fmt_ts(&contact.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_contact(&self, id: &str) -> StorageResult<Option<Contact>> {
        let row: Option<ContactRow> = sqlx::query_as(
            r#"
            SELECT id, first_name, last_name, email, phone, title, account_id, lead_source, created_at, updated_at
            FROM contacts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Contact::try_from).transpose()
    }

    async fn update_contact(&self, contact: &Contact) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET first_name = ?, last_name = ?, email = ?, phone = ?, title = ?,
                account_id = ?, lead_source = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.title)
        .bind(&contact.account_id)
        .bind(contact.lead_source.map(|s| s.as_str()))
        .bind(fmt_ts(&contact.updated_at))
        .bind(&contact.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Contact", &contact.id));
        }

        Ok(())
    }

    async fn list_contact_ids(&self) -> StorageResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM contacts ORDER BY created_at ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    async fn create_lead(&self, lead: &Lead) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leads (id, first_name, last_name, email, phone, company, status, source, score,
                               assigned_user_id, converted_contact_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lead.id)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company)
        .bind(lead.status.as_str())
        .bind(lead.source.map(|s| s.as_str()))
        .bind(lead.score.map(i64::from))
        .bind(&lead.assigned_user_id)
        .bind(&lead.converted_contact_id)
        .bind(fmt_ts(&lead.created_at))
        .bind(fmt_ts(&lead.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_lead(&self, id: &str) -> StorageResult<Option<Lead>> {
        let row: Option<LeadRow> = sqlx::query_as(
            r#"
            SELECT id, first_name, last_name, email, phone, company, status, source, score,
                   assigned_user_id, converted_contact_id, created_at, updated_at
            FROM leads
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Lead::try_from).transpose()
    }

    async fn update_lead(&self, lead: &Lead) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET first_name = ?, last_name = ?, email = ?, phone = ?, company = ?, status = ?,
                source = ?, score = ?, assigned_user_id = ?, converted_contact_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company)
        .bind(lead.status.as_str())
        .bind(lead.source.map(|s| s.as_str()))
        .bind(lead.score.map(i64::from))
        .bind(&lead.assigned_user_id)
        .bind(&lead.converted_contact_id)
        .bind(fmt_ts(&lead.updated_at))
        .bind(&lead.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Lead", &lead.id));
        }

        Ok(())
    }

    async fn create_opportunity(&self, opportunity: &Opportunity) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO opportunities (id, name, account_id, contact_id, sales_stage, amount, probability,
                                       date_closed, assigned_user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&opportunity.id)
        .bind(&opportunity.name)
        .bind(&opportunity.account_id)
        .bind(&opportunity.contact_id)
        .bind(opportunity.sales_stage.as_str())
        .bind(opportunity.amount)
        .bind(i64::from(opportunity.probability))
        .bind(opportunity.date_closed.as_ref().map(fmt_ts))
        .bind(&opportunity.assigned_user_id)
        .bind(fmt_ts(&opportunity.created_at))
        .bind(fmt_ts(&opportunity.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_opportunity(&self, id: &str) -> StorageResult<Option<Opportunity>> {
        let row: Option<OpportunityRow> = sqlx::query_as(
            r#"
            SELECT id, name, account_id, contact_id, sales_stage, amount, probability,
                   date_closed, assigned_user_id, created_at, updated_at
            FROM opportunities
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Opportunity::try_from).transpose()
    }

    async fn update_opportunity(&self, opportunity: &Opportunity) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE opportunities
            SET name = ?, account_id = ?, contact_id = ?, sales_stage = ?, amount = ?, probability = ?,
                date_closed = ?, assigned_user_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&opportunity.name)
        .bind(&opportunity.account_id)
        .bind(&opportunity.contact_id)
        .bind(opportunity.sales_stage.as_str())
        .bind(opportunity.amount)
        .bind(i64::from(opportunity.probability))
        .bind(opportunity.date_closed.as_ref().map(fmt_ts))
        .bind(&opportunity.assigned_user_id)
        .bind(fmt_ts(&opportunity.updated_at))
        .bind(&opportunity.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Opportunity", &opportunity.id));
        }

        Ok(())
    }

    async fn list_open_opportunities(&self) -> StorageResult<Vec<Opportunity>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, name, account_id, contact_id, sales_stage, amount, probability,
                   date_closed, assigned_user_id, created_at, updated_at
            FROM opportunities
            WHERE sales_stage NOT IN (
            "#,
        );
        let mut closed = qb.separated(", ");
        for stage in SalesStage::ALL.iter().filter(|s| s.is_closed()) {
            closed.push_bind(stage.as_str());
        }
        closed.push_unseparated(") ORDER BY created_at ASC");

        let rows: Vec<OpportunityRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter().map(Opportunity::try_from).collect()
    }

    async fn create_case(&self, case: &Case) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cases (id, subject, description, contact_id, account_id, status, priority, case_type,
                               resolution, sentiment_label, sentiment_score, resolved_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&case.id)
        .bind(&case.subject)
        .bind(&case.description)
        .bind(&case.contact_id)
        .bind(&case.account_id)
        .bind(case.status.as_str())
        .bind(case.priority.as_str())
        .bind(case.case_type.map(|t| t.as_str()))
        .bind(&case.resolution)
        .bind(&case.sentiment_label)
        .bind(case.sentiment_score)
        .bind(case.resolved_at.as_ref().map(fmt_ts))
        .bind(fmt_ts(&case.created_at))
        .bind(fmt_ts(&case.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_case(&self, id: &str) -> StorageResult<Option<Case>> {
        let row: Option<CaseRow> = sqlx::query_as(
            r#"
            SELECT id, subject, description, contact_id, account_id, status, priority, case_type,
                   resolution, sentiment_label, sentiment_score, resolved_at, created_at, updated_at
            FROM cases
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Case::try_from).transpose()
    }

    async fn update_case(&self, case: &Case) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cases
            SET subject = ?, description = ?, contact_id = ?, account_id = ?, status = ?, priority = ?,
                case_type = ?, resolution = ?, sentiment_label = ?, sentiment_score = ?, resolved_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&case.subject)
        .bind(&case.description)
        .bind(&case.contact_id)
        .bind(&case.account_id)
        .bind(case.status.as_str())
        .bind(case.priority.as_str())
        .bind(case.case_type.map(|t| t.as_str()))
        .bind(&case.resolution)
        .bind(&case.sentiment_label)
        .bind(case.sentiment_score)
        .bind(case.resolved_at.as_ref().map(fmt_ts))
        .bind(fmt_ts(&case.updated_at))
        .bind(&case.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Case", &case.id));
        }

        Ok(())
    }

    async fn create_activity(&self, activity: &Activity) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, kind, subject, status, priority, direction, duration_minutes,
                                    starts_at, ends_at, contact_id, parent_type, parent_id, body, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.id)
        .bind(activity.kind.as_str())
        .bind(&activity.subject)
        .bind(&activity.status)
        .bind(&activity.priority)
        .bind(&activity.direction)
        .bind(activity.duration_minutes)
        .bind(activity.starts_at.as_ref().map(fmt_ts))
        .bind(activity.ends_at.as_ref().map(fmt_ts))
        .bind(&activity.contact_id)
        .bind(activity.parent_type.map(|p| p.as_str()))
        .bind(&activity.parent_id)
        .bind(&activity.body)
        .bind(fmt_ts(&activity.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_contact_activities(&self, contact_id: &str) -> StorageResult<Vec<Activity>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT id, kind, subject, status, priority, direction, duration_minutes,
                   starts_at, ends_at, contact_id, parent_type, parent_id, body, created_at
            FROM activities
            WHERE contact_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(contact_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Activity::try_from).collect()
    }

    async fn create_quote(&self, quote: &Quote) -> StorageResult<()> {
        let line_items =
            serde_json::to_string(&quote.line_items).map_err(|e| StorageError::Query {
                message: format!("Failed to encode quote line items: {}", e),
            })?;

        sqlx::query(
            r#"
            INSERT INTO quotes (id, name, opportunity_id, stage, subtotal, discount_percent, total,
                                line_items, valid_until, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&quote.id)
        .bind(&quote.name)
        .bind(&quote.opportunity_id)
        .bind(quote.stage.as_str())
        .bind(quote.subtotal)
        .bind(quote.discount_percent)
        .bind(quote.total)
        .bind(&line_items)
        .bind(quote.valid_until.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(fmt_ts(&quote.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_quote(&self, id: &str) -> StorageResult<Option<Quote>> {
        let row: Option<QuoteRow> = sqlx::query_as(
            r#"
            SELECT id, name, opportunity_id, stage, subtotal, discount_percent, total,
                   line_items, valid_until, created_at
            FROM quotes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quote::try_from).transpose()
    }

    async fn record_session(&self, session: &ActivitySession) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_sessions (id, visitor_id, contact_id, lead_id, page_views, duration_seconds, started_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.visitor_id)
        .bind(&session.contact_id)
        .bind(&session.lead_id)
        .bind(session.page_views)
        .bind(session.duration_seconds)
        .bind(fmt_ts(&session.started_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_health_history(
        &self,
        contact_id: &str,
        limit: u32,
    ) -> StorageResult<Vec<HealthScore>> {
        let rows: Vec<HealthScoreRow> = sqlx::query_as(
            r#"
            SELECT id, contact_id, score, activity, support, usage, relationship, trend, risk_level,
                   supersedes_id, calculated_at
            FROM health_scores
            WHERE contact_id = ?
            ORDER BY calculated_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(contact_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthScore::try_from).collect()
    }

    async fn log_invocation(&self, invocation: &Invocation) -> StorageResult<()> {
        let input = serde_json::to_string(&invocation.input).unwrap_or_default();
        let output = invocation
            .output
            .as_ref()
            .map(|o| serde_json::to_string(o).unwrap_or_default());

        sqlx::query(
            r#"
            INSERT INTO invocations (id, tool_name, input, output, latency_ms, success, error, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&invocation.id)
        .bind(&invocation.tool_name)
        .bind(&input)
        .bind(&output)
        .bind(invocation.latency_ms)
        .bind(invocation.success)
        .bind(&invocation.error)
        .bind(fmt_ts(&invocation.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl HealthQuery for SqliteStorage {
    async fn count_contact_sessions_since(
        &self,
        contact_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM activity_sessions WHERE contact_id = ? AND started_at >= ?",
        )
        .bind(contact_id)
        .bind(fmt_ts(&since))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_cases_since(
        &self,
        contact_id: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<CaseCounts> {
        let (total, resolved): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status IN (?, ?) THEN 1 ELSE 0 END), 0)
            FROM cases
            WHERE contact_id = ? AND created_at >= ?
            "#,
        )
        .bind(CaseStatus::Resolved.as_str())
        .bind(CaseStatus::Closed.as_str())
        .bind(contact_id)
        .bind(fmt_ts(&since))
        .fetch_one(&self.pool)
        .await?;

        Ok(CaseCounts { total, resolved })
    }

    async fn has_account_multiple_contacts(&self, account_id: &str) -> StorageResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 1)
    }

    async fn latest_health_score(&self, contact_id: &str) -> StorageResult<Option<HealthScore>> {
        let row: Option<HealthScoreRow> = sqlx::query_as(
            r#"
            SELECT id, contact_id, score, activity, support, usage, relationship, trend, risk_level,
                   supersedes_id, calculated_at
            FROM health_scores
            WHERE contact_id = ?
            ORDER BY calculated_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthScore::try_from).transpose()
    }

    async fn insert_health_score(&self, score: &HealthScore) -> StorageResult<()> {
        // Take the write lock before reading the latest score, so two writers
        // never both pass the check below.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| busy_as_conflict(e, &score.contact_id))?;

        let latest: Option<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM health_scores
            WHERE contact_id = ?
            ORDER BY calculated_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(&score.contact_id)
        .fetch_optional(&mut *tx)
        .await?;

        if latest != score.supersedes_id {
            debug!(
                contact_id = %score.contact_id,
                expected = ?score.supersedes_id,
                found = ?latest,
                "Health score superseded concurrently"
            );
            return Err(StorageError::Conflict {
                entity: "HealthScore".to_string(),
                id: score.contact_id.clone(),
                message: "a newer health score was recorded".to_string(),
            });
        }

        sqlx::query(
            r#"
            INSERT INTO health_scores (id, contact_id, score, activity, support, usage, relationship,
                                       trend, risk_level, supersedes_id, calculated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&score.id)
        .bind(&score.contact_id)
        .bind(score.score)
        .bind(score.factors.activity)
        .bind(score.factors.support)
        .bind(score.factors.usage)
        .bind(score.factors.relationship)
        .bind(score.trend.as_str())
        .bind(score.risk_level.as_str())
        .bind(&score.supersedes_id)
        .bind(fmt_ts(&score.calculated_at))
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| busy_as_conflict(e, &score.contact_id))?;
        Ok(())
    }
}

/// A writer that outlasted [`BUSY_TIMEOUT`] is reported as a conflict so the
/// caller recalculates instead of failing.
fn busy_as_conflict(err: sqlx::Error, contact_id: &str) -> StorageError {
    let busy = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "5" || code == "517")
        .unwrap_or(false);
    if busy {
        StorageError::Conflict {
            entity: "HealthScore".to_string(),
            id: contact_id.to_string(),
            message: "database busy".to_string(),
        }
    } else {
        err.into()
    }
}

#[async_trait]
impl AnalyticsQuery for SqliteStorage {
    async fn count(&self, query: &AggregateQuery) -> StorageResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(query.entity.table());
        push_filters(&mut qb, query)?;

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn count_distinct(&self, query: &AggregateQuery, field: Field) -> StorageResult<i64> {
        let column = query.entity.field_column(field)?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(DISTINCT ");
        qb.push(column).push(") FROM ").push(query.entity.table());
        push_filters(&mut qb, query)?;

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn count_by(
        &self,
        query: &AggregateQuery,
        field: Field,
    ) -> StorageResult<Vec<(String, i64)>> {
        let column = query.entity.field_column(field)?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(column)
            .push(", COUNT(*) FROM ")
            .push(query.entity.table());
        push_filters(&mut qb, query)?;
        qb.push(" AND ")
            .push(column)
            .push(" IS NOT NULL GROUP BY ")
            .push(column)
            .push(" ORDER BY ")
            .push(column);

        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn sum(&self, query: &AggregateQuery, measure: Measure) -> StorageResult<f64> {
        let column = query.entity.measure_column(measure)?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT CAST(COALESCE(SUM(");
        qb.push(column)
            .push("), 0) AS REAL) FROM ")
            .push(query.entity.table());
        push_filters(&mut qb, query)?;

        let total: f64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn avg(&self, query: &AggregateQuery, measure: Measure) -> StorageResult<Option<f64>> {
        let column = query.entity.measure_column(measure)?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT CAST(AVG(");
        qb.push(column)
            .push(") AS REAL) FROM ")
            .push(query.entity.table());
        push_filters(&mut qb, query)?;

        let mean: Option<f64> = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(mean)
    }

    async fn points(
        &self,
        query: &AggregateQuery,
        measure: Option<Measure>,
    ) -> StorageResult<Vec<DataPoint>> {
        let date_column = query.entity.date_column(query.date_field)?;
        let value_column = match measure {
            Some(m) => query.entity.measure_column(m)?,
            None => "1",
        };

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        qb.push(date_column)
            .push(", CAST(COALESCE(")
            .push(value_column)
            .push(", 0) AS REAL) FROM ")
            .push(query.entity.table());
        push_filters(&mut qb, query)?;
        qb.push(" AND ")
            .push(date_column)
            .push(" IS NOT NULL ORDER BY ")
            .push(date_column)
            .push(" ASC");

        let rows: Vec<(String, f64)> = qb.build_query_as().fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(at, value)| {
                Ok(DataPoint {
                    at: parse_ts(&at)?,
                    value,
                })
            })
            .collect()
    }
}

/// Append `WHERE` predicates for `query`. Every value is bound, never inlined.
fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &AggregateQuery) -> StorageResult<()> {
    let entity = query.entity;
    qb.push(" WHERE 1 = 1");

    for condition in &query.conditions {
        match condition {
            Condition::Eq(field, value) => {
                qb.push(" AND ")
                    .push(entity.field_column(*field)?)
                    .push(" = ")
                    .push_bind(value.clone());
            }
            Condition::In(field, values) => {
                let column = entity.field_column(*field)?;
                if values.is_empty() {
                    qb.push(" AND 0");
                    continue;
                }
                qb.push(" AND ").push(column).push(" IN (");
                let mut list = qb.separated(", ");
                for value in values {
                    list.push_bind(value.clone());
                }
                list.push_unseparated(")");
            }
            Condition::NotIn(field, values) => {
                let column = entity.field_column(*field)?;
                if values.is_empty() {
                    continue;
                }
                qb.push(" AND ").push(column).push(" NOT IN (");
                let mut list = qb.separated(", ");
                for value in values {
                    list.push_bind(value.clone());
                }
                list.push_unseparated(")");
            }
            Condition::IsSet(field) => {
                qb.push(" AND ")
                    .push(entity.field_column(*field)?)
                    .push(" IS NOT NULL");
            }
        }
    }

    if let Some(range) = &query.range {
        let column = entity.date_column(query.date_field)?;
        qb.push(" AND ")
            .push(column)
            .push(" >= ")
            .push_bind(fmt_ts(&range.start))
            .push(" AND ")
            .push(column)
            .push(" <= ")
            .push_bind(fmt_ts(&range.end));
    }

    Ok(())
}

/// Fixed-width UTC timestamp so stored values sort lexically.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Query {
            message: format!("Invalid timestamp '{}': {}", raw, e),
        })
}

fn parse_opt_ts(raw: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_label<T: FromStr<Err = String>>(raw: &str) -> StorageResult<T> {
    raw.parse()
        .map_err(|message: String| StorageError::Query { message })
}

fn parse_opt_label<T: FromStr<Err = String>>(raw: Option<String>) -> StorageResult<Option<T>> {
    raw.as_deref().map(parse_label).transpose()
}

fn not_found(entity: &str, id: &str) -> StorageError {
    StorageError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    name: String,
    industry: Option<String>,
    website: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AccountRow> for Account {
    type Error = StorageError;

    fn try_from(row: AccountRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            industry: row.industry,
            website: row.website,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: String,
    first_name: Option<String>,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    title: Option<String>,
    account_id: Option<String>,
    lead_source: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ContactRow> for Contact {
    type Error = StorageError;

    fn try_from(row: ContactRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            title: row.title,
            account_id: row.account_id,
            lead_source: parse_opt_label(row.lead_source)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LeadRow {
    id: String,
    first_name: Option<String>,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    company: Option<String>,
    status: String,
    source: Option<String>,
    score: Option<i64>,
    assigned_user_id: Option<String>,
    converted_contact_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<LeadRow> for Lead {
    type Error = StorageError;

    fn try_from(row: LeadRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            status: parse_label(&row.status)?,
            source: parse_opt_label(row.source)?,
            score: row.score.map(|s| s.clamp(0, 100) as u8),
            assigned_user_id: row.assigned_user_id,
            converted_contact_id: row.converted_contact_id,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OpportunityRow {
    id: String,
    name: String,
    account_id: Option<String>,
    contact_id: Option<String>,
    sales_stage: String,
    amount: f64,
    probability: i64,
    date_closed: Option<String>,
    assigned_user_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<OpportunityRow> for Opportunity {
    type Error = StorageError;

    fn try_from(row: OpportunityRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            account_id: row.account_id,
            contact_id: row.contact_id,
            sales_stage: parse_label(&row.sales_stage)?,
            amount: row.amount,
            probability: row.probability.clamp(0, 100) as u8,
            date_closed: parse_opt_ts(row.date_closed)?,
            assigned_user_id: row.assigned_user_id,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CaseRow {
    id: String,
    subject: String,
    description: Option<String>,
    contact_id: Option<String>,
    account_id: Option<String>,
    status: String,
    priority: String,
    case_type: Option<String>,
    resolution: Option<String>,
    sentiment_label: Option<String>,
    sentiment_score: Option<f64>,
    resolved_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CaseRow> for Case {
    type Error = StorageError;

    fn try_from(row: CaseRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            subject: row.subject,
            description: row.description,
            contact_id: row.contact_id,
            account_id: row.account_id,
            status: parse_label(&row.status)?,
            priority: parse_label(&row.priority)?,
            case_type: parse_opt_label(row.case_type)?,
            resolution: row.resolution,
            sentiment_label: row.sentiment_label,
            sentiment_score: row.sentiment_score,
            resolved_at: parse_opt_ts(row.resolved_at)?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: String,
    kind: String,
    subject: String,
    status: Option<String>,
    priority: Option<String>,
    direction: Option<String>,
    duration_minutes: Option<i64>,
    starts_at: Option<String>,
    ends_at: Option<String>,
    contact_id: Option<String>,
    parent_type: Option<String>,
    parent_id: Option<String>,
    body: Option<String>,
    created_at: String,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = StorageError;

    fn try_from(row: ActivityRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            kind: parse_label(&row.kind)?,
            subject: row.subject,
            status: row.status,
            priority: row.priority,
            direction: row.direction,
            duration_minutes: row.duration_minutes,
            starts_at: parse_opt_ts(row.starts_at)?,
            ends_at: parse_opt_ts(row.ends_at)?,
            contact_id: row.contact_id,
            parent_type: parse_opt_label(row.parent_type)?,
            parent_id: row.parent_id,
            body: row.body,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: String,
    name: String,
    opportunity_id: Option<String>,
    stage: String,
    subtotal: f64,
    discount_percent: f64,
    total: f64,
    line_items: String,
    valid_until: Option<String>,
    created_at: String,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = StorageError;

    fn try_from(row: QuoteRow) -> StorageResult<Self> {
        let line_items = serde_json::from_str(&row.line_items).map_err(|e| StorageError::Query {
            message: format!("Invalid quote line items: {}", e),
        })?;
        let valid_until = row
            .valid_until
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| StorageError::Query {
                    message: format!("Invalid date '{}': {}", raw, e),
                })
            })
            .transpose()?;

        Ok(Self {
            id: row.id,
            name: row.name,
            opportunity_id: row.opportunity_id,
            stage: parse_label(&row.stage)?,
            line_items,
            subtotal: row.subtotal,
            discount_percent: row.discount_percent,
            total: row.total,
            valid_until,
            created_at: parse_ts(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HealthScoreRow {
    id: String,
    contact_id: String,
    score: f64,
    activity: f64,
    support: f64,
    usage: f64,
    relationship: f64,
    trend: String,
    risk_level: String,
    supersedes_id: Option<String>,
    calculated_at: String,
}

impl TryFrom<HealthScoreRow> for HealthScore {
    type Error = StorageError;

    fn try_from(row: HealthScoreRow) -> StorageResult<Self> {
        Ok(Self {
            id: row.id,
            contact_id: row.contact_id,
            score: row.score,
            factors: HealthFactors {
                activity: row.activity,
                support: row.support,
                usage: row.usage,
                relationship: row.relationship,
            },
            trend: parse_label(&row.trend)?,
            risk_level: parse_label(&row.risk_level)?,
            supersedes_id: row.supersedes_id,
            calculated_at: parse_ts(&row.calculated_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fmt_ts_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let fractional = whole + chrono::Duration::milliseconds(250);
        assert_eq!(fmt_ts(&whole), "2024-01-02T03:04:05.000000Z");
        assert_eq!(fmt_ts(&fractional), "2024-01-02T03:04:05.250000Z");
        assert!(fmt_ts(&whole) < fmt_ts(&fractional));
    }

    #[test]
    fn test_parse_ts_round_trips() {
        let at = Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap();
        assert_eq!(parse_ts(&fmt_ts(&at)).unwrap(), at);
        assert!(parse_ts("yesterday").is_err());
    }
}
