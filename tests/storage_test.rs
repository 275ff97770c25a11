//! Integration tests for SQLite storage layer
//!
//! Tests record persistence, aggregate queries and the guarded health score
//! insert using an in-memory SQLite database.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use crm_insights::config::DatabaseConfig;
use crm_insights::error::StorageError;
use crm_insights::pipeline::SalesStage;
use crm_insights::storage::{
    Account, ActivitySession, AggregateQuery, AnalyticsQuery, Case, CasePriority, CaseStatus,
    Contact, DateRange, Entity, Field, HealthFactors, HealthQuery, HealthScore, Invocation, Lead,
    LeadStatus, Measure, Opportunity, RiskLevel, SqliteStorage, Storage, Trend,
};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn score_for(contact_id: &str, score: f64, supersedes: Option<&HealthScore>) -> HealthScore {
    HealthScore {
        id: uuid::Uuid::new_v4().to_string(),
        contact_id: contact_id.to_string(),
        score,
        factors: HealthFactors {
            activity: score,
            support: 0.0,
            usage: 0.0,
            relationship: 0.0,
        },
        trend: Trend::Stable,
        risk_level: RiskLevel::Medium,
        supersedes_id: supersedes.map(|s| s.id.clone()),
        calculated_at: at(10, 12),
    }
}

#[cfg(test)]
mod record_tests {
    use super::*;

    #[tokio::test]
    async fn test_contact_round_trip() {
        let storage = create_test_storage().await;
        let account = Account::new("Initech", at(1, 9));
        storage.create_account(&account).await.unwrap();

        let contact = Contact::new("Lumbergh", at(1, 9))
            .with_account(&account.id)
            .with_email("bill@initech.example");
        storage.create_contact(&contact).await.unwrap();

        let loaded = storage.get_contact(&contact.id).await.unwrap().unwrap();
        assert_eq!(loaded, contact);
    }

    #[tokio::test]
    async fn test_get_nonexistent_returns_none() {
        let storage = create_test_storage().await;

        assert!(storage.get_contact("missing").await.unwrap().is_none());
        assert!(storage.get_lead("missing").await.unwrap().is_none());
        assert!(storage.get_case("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let storage = create_test_storage().await;
        let lead = Lead::new("Ghost", at(1, 9));

        let err = storage.update_lead(&lead).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_contact_requires_existing_account() {
        let storage = create_test_storage().await;
        let contact = Contact::new("Orphan", at(1, 9)).with_account("no-such-account");

        assert!(storage.create_contact(&contact).await.is_err());
    }

    #[tokio::test]
    async fn test_list_open_opportunities_skips_closed_stages() {
        let storage = create_test_storage().await;
        let open = Opportunity::new("Open", SalesStage::Qualification, 1000.0, at(2, 9));
        let won = Opportunity::new("Won", SalesStage::ClosedWon, 500.0, at(2, 9))
            .with_date_closed(at(3, 9));
        let lost = Opportunity::new("Lost", SalesStage::ClosedLost, 700.0, at(2, 9))
            .with_date_closed(at(3, 9));
        for opp in [&open, &won, &lost] {
            storage.create_opportunity(opp).await.unwrap();
        }

        let listed = storage.list_open_opportunities().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, open.id);
    }

    #[tokio::test]
    async fn test_case_round_trip_keeps_resolution_time() {
        let storage = create_test_storage().await;
        let case = Case::new("Printer on fire", CasePriority::High, at(4, 9))
            .with_status(CaseStatus::Resolved, at(4, 11));
        storage.create_case(&case).await.unwrap();

        let loaded = storage.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CaseStatus::Resolved);
        assert_eq!(loaded.resolved_at, Some(at(4, 11)));
    }

    #[tokio::test]
    async fn test_log_invocation() {
        let storage = create_test_storage().await;
        let invocation = Invocation::new("crm_lead_get", json!({"id": "l-1"}), at(5, 9))
            .failure("Lead not found: l-1", 2);

        storage.log_invocation(&invocation).await.unwrap();

        let (success, error): (bool, Option<String>) =
            sqlx::query_as("SELECT success, error FROM invocations WHERE id = ?")
                .bind(&invocation.id)
                .fetch_one(storage.pool())
                .await
                .unwrap();
        assert!(!success);
        assert_eq!(error.as_deref(), Some("Lead not found: l-1"));
    }
}

#[cfg(test)]
mod health_query_tests {
    use super::*;

    async fn seeded_contact(storage: &SqliteStorage) -> Contact {
        let contact = Contact::new("Waddams", at(1, 9));
        storage.create_contact(&contact).await.unwrap();
        contact
    }

    #[tokio::test]
    async fn test_count_sessions_since_is_inclusive() {
        let storage = create_test_storage().await;
        let contact = seeded_contact(&storage).await;
        for day in [1, 5, 9] {
            let session = ActivitySession::new("v-1", at(day, 12)).with_contact(&contact.id);
            storage.record_session(&session).await.unwrap();
        }

        let count = storage
            .count_contact_sessions_since(&contact.id, at(5, 12))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_count_cases_counts_resolved_and_closed() {
        let storage = create_test_storage().await;
        let contact = seeded_contact(&storage).await;
        let statuses = [CaseStatus::New, CaseStatus::Resolved, CaseStatus::Closed];
        for status in statuses {
            let case = Case::new("Stapler", CasePriority::Low, at(6, 9))
                .with_contact(&contact.id)
                .with_status(status, at(6, 10));
            storage.create_case(&case).await.unwrap();
        }

        let counts = storage
            .count_cases_since(&contact.id, at(1, 0))
            .await
            .unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.resolved, 2);
    }

    #[tokio::test]
    async fn test_multiple_contacts_on_account() {
        let storage = create_test_storage().await;
        let account = Account::new("Initech", at(1, 9));
        storage.create_account(&account).await.unwrap();
        storage
            .create_contact(&Contact::new("Smykowski", at(1, 9)).with_account(&account.id))
            .await
            .unwrap();

        assert!(!storage
            .has_account_multiple_contacts(&account.id)
            .await
            .unwrap());

        storage
            .create_contact(&Contact::new("Bolton", at(1, 9)).with_account(&account.id))
            .await
            .unwrap();
        assert!(storage
            .has_account_multiple_contacts(&account.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_insert_health_score_chain() {
        let storage = create_test_storage().await;
        let contact = seeded_contact(&storage).await;

        let first = score_for(&contact.id, 0.4, None);
        storage.insert_health_score(&first).await.unwrap();
        let second = score_for(&contact.id, 0.6, Some(&first));
        storage.insert_health_score(&second).await.unwrap();

        let latest = storage.latest_health_score(&contact.id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);

        let history = storage.get_health_history(&contact.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
    }

    #[tokio::test]
    async fn test_insert_stale_health_score_conflicts() {
        let storage = create_test_storage().await;
        let contact = seeded_contact(&storage).await;

        let first = score_for(&contact.id, 0.4, None);
        storage.insert_health_score(&first).await.unwrap();

        // Computed before `first` landed
        let stale = score_for(&contact.id, 0.5, None);
        let err = storage.insert_health_score(&stale).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let history = storage.get_health_history(&contact.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}

#[cfg(test)]
mod aggregate_tests {
    use super::*;

    fn march() -> DateRange {
        DateRange::new(at(1, 0), at(31, 23)).unwrap()
    }

    #[tokio::test]
    async fn test_count_and_count_by_within_range() {
        let storage = create_test_storage().await;
        let leads = [
            Lead::new("A", at(2, 9)).with_status(LeadStatus::New),
            Lead::new("B", at(3, 9)).with_status(LeadStatus::Qualified),
            Lead::new("C", at(4, 9)).with_status(LeadStatus::Qualified),
            Lead::new("D", at(1, 9) - Duration::days(5)).with_status(LeadStatus::Qualified),
        ];
        for lead in &leads {
            storage.create_lead(lead).await.unwrap();
        }

        let query = AggregateQuery::new(Entity::Lead).within(march());
        assert_eq!(storage.count(&query).await.unwrap(), 3);

        let by_status = storage.count_by(&query, Field::Status).await.unwrap();
        assert!(by_status.contains(&("Qualified".to_string(), 2)));
        assert!(by_status.contains(&("New".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_count_distinct_visitors() {
        let storage = create_test_storage().await;
        for visitor in ["v-1", "v-1", "v-2"] {
            storage
                .record_session(&ActivitySession::new(visitor, at(8, 10)))
                .await
                .unwrap();
        }

        let query = AggregateQuery::new(Entity::Visitor).within(march());
        assert_eq!(storage.count(&query).await.unwrap(), 3);
        assert_eq!(
            storage
                .count_distinct(&query, Field::VisitorId)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_sum_and_avg_by_close_date() {
        let storage = create_test_storage().await;
        let in_range = Opportunity::new("In", SalesStage::ClosedWon, 1200.0, at(1, 9))
            .with_date_closed(at(10, 9));
        let out_of_range = Opportunity::new("Out", SalesStage::ClosedWon, 800.0, at(1, 9))
            .with_date_closed(at(1, 9) - Duration::days(3));
        storage.create_opportunity(&in_range).await.unwrap();
        storage.create_opportunity(&out_of_range).await.unwrap();

        let query = AggregateQuery::new(Entity::Opportunity)
            .closed_within(march())
            .eq(Field::SalesStage, SalesStage::ClosedWon.as_str());
        assert_eq!(storage.sum(&query, Measure::Amount).await.unwrap(), 1200.0);
        assert_eq!(
            storage.avg(&query, Measure::Amount).await.unwrap(),
            Some(1200.0)
        );
    }

    #[tokio::test]
    async fn test_empty_aggregates() {
        let storage = create_test_storage().await;
        let query = AggregateQuery::new(Entity::Opportunity).within(march());

        assert_eq!(storage.sum(&query, Measure::Amount).await.unwrap(), 0.0);
        assert_eq!(storage.avg(&query, Measure::Amount).await.unwrap(), None);
        assert!(storage.points(&query, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_any_of_matches_nothing() {
        let storage = create_test_storage().await;
        storage
            .create_lead(&Lead::new("A", at(2, 9)))
            .await
            .unwrap();

        let query = AggregateQuery::new(Entity::Lead).any_of(Field::Status, Vec::<String>::new());
        assert_eq!(storage.count(&query).await.unwrap(), 0);

        let query = AggregateQuery::new(Entity::Lead).none_of(Field::Status, Vec::<String>::new());
        assert_eq!(storage.count(&query).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_field_is_query_error() {
        let storage = create_test_storage().await;
        let query = AggregateQuery::new(Entity::Lead);

        let err = storage.count_by(&query, Field::Kind).await.unwrap_err();
        assert!(matches!(err, StorageError::Query { .. }));
    }
}

#[cfg(test)]
mod file_backed_tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_persists_across_pools() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("crm.db"),
            max_connections: 2,
        };

        let lead = Lead::new("Durable", at(2, 9));
        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            storage.create_lead(&lead).await.unwrap();
            storage.pool().close().await;
        }

        let storage = SqliteStorage::new(&config).await.unwrap();
        let loaded = storage.get_lead(&lead.id).await.unwrap();
        assert_eq!(loaded.map(|l| l.last_name), Some("Durable".to_string()));
    }
}
