//! Integration tests for the sentiment client
//!
//! Tests HTTP behavior using wiremock, and case enrichment through
//! `CaseService` with the client pointed at the mock server.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crm_insights::config::SentimentConfig;
use crm_insights::dto::CaseInput;
use crm_insights::error::SentimentError;
use crm_insights::sentiment::{HttpSentimentClient, SentimentAnalyzer};
use crm_insights::services::{CaseService, ServiceCore};
use crm_insights::storage::{SqliteStorage, Storage};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> HttpSentimentClient {
    HttpSentimentClient::new(
        format!("{}/v1/sentiment", base_url),
        Some("test-api-key".to_string()),
        2000,
    )
    .expect("Failed to create client")
}

#[cfg(test)]
mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_analysis() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sentiment"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({ "text": "The dashboard is great" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "positive",
                "score": 0.82
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let sentiment = client.analyze("The dashboard is great").await.unwrap();

        assert_eq!(sentiment.label, "positive");
        assert_eq!(sentiment.score, 0.82);
    }

    #[tokio::test]
    async fn test_no_auth_header_without_key() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/sentiment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "neutral",
                "score": 0.0
            })))
            .mount(&mock_server)
            .await;

        let client = HttpSentimentClient::new(
            format!("{}/v1/sentiment", mock_server.uri()),
            None,
            2000,
        )
        .unwrap();
        client.analyze("ok").await.unwrap();

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.analyze("anything").await.unwrap_err();

        match err {
            SentimentError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "mood": "sunny" })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.analyze("anything").await.unwrap_err();

        assert!(matches!(err, SentimentError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "label": "neutral", "score": 0.0 }))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let client = HttpSentimentClient::new(mock_server.uri(), None, 50).unwrap();
        let err = client.analyze("anything").await.unwrap_err();

        assert!(matches!(err, SentimentError::Timeout { timeout_ms: 50 }));
    }

    #[test]
    fn test_from_config_disabled_without_url() {
        let config = SentimentConfig {
            api_url: None,
            api_key: Some("unused".to_string()),
            timeout_ms: 1000,
        };

        assert!(HttpSentimentClient::from_config(&config).unwrap().is_none());
    }
}

#[cfg(test)]
mod enrichment_tests {
    use super::*;

    async fn case_service(analyzer: HttpSentimentClient) -> (CaseService, SqliteStorage) {
        let storage = SqliteStorage::new_in_memory()
            .await
            .expect("Failed to create in-memory storage");
        let core = ServiceCore::new(storage.clone()).with_sentiment(Arc::new(analyzer));
        (CaseService::new(core), storage)
    }

    fn case_input() -> CaseInput {
        CaseInput {
            subject: Some("Export broken".to_string()),
            description: Some("Every CSV export fails".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_case_is_enriched() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_json(json!({ "text": "Export broken\nEvery CSV export fails" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "negative",
                "score": -0.7
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (service, storage) = case_service(create_test_client(&mock_server.uri())).await;
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap();
        let case = service.create(case_input(), now).await.unwrap();

        assert_eq!(case.sentiment_label.as_deref(), Some("negative"));
        assert_eq!(case.sentiment_score, Some(-0.7));

        let stored = storage.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(stored.sentiment_label.as_deref(), Some("negative"));
    }

    #[tokio::test]
    async fn test_case_is_stored_when_analysis_fails() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (service, storage) = case_service(create_test_client(&mock_server.uri())).await;
        let now = Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap();
        let case = service.create(case_input(), now).await.unwrap();

        assert!(case.sentiment_label.is_none());
        assert!(case.sentiment_score.is_none());
        assert!(storage.get_case(&case.id).await.unwrap().is_some());
    }
}
