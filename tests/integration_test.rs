//! End-to-end tests through the MCP tool surface
//!
//! Walks a customer from first visit to closed deal using only tool calls,
//! then checks health, pipeline, analytics and the invocation log.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crm_insights::server::{JsonRpcRequest, McpServer};
use crm_insights::storage::SqliteStorage;
use crm_insights::{AppState, Config, FixedClock, SharedState};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap()
}

struct Harness {
    server: McpServer,
    state: SharedState,
    next_id: std::sync::atomic::AtomicI64,
}

/// Outcome of one tool call
struct Outcome {
    body: Value,
    text: String,
    is_error: bool,
}

impl Harness {
    async fn new() -> Self {
        let storage = SqliteStorage::new_in_memory()
            .await
            .expect("Failed to create in-memory storage");
        let state: SharedState = Arc::new(
            AppState::new(Config::default(), storage, None).with_clock(Arc::new(FixedClock(now()))),
        );
        Self {
            server: McpServer::new(state.clone()),
            state,
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }

    async fn call(&self, name: &str, arguments: Value) -> Outcome {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }))
        .unwrap();

        let response = self.server.handle_request(request).await.unwrap();
        let result = response.result.expect("tool calls answer with a result");
        let text = result["content"][0]["text"].as_str().unwrap().to_string();
        Outcome {
            body: serde_json::from_str(&text).unwrap_or(Value::Null),
            is_error: result.get("isError") == Some(&Value::Bool(true)),
            text,
        }
    }

    /// Call a tool that must succeed and return its JSON body
    async fn ok(&self, name: &str, arguments: Value) -> Value {
        let outcome = self.call(name, arguments).await;
        assert!(!outcome.is_error, "{name} failed: {}", outcome.text);
        outcome.body
    }

    async fn invocation_counts(&self) -> (i64, i64) {
        sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN success THEN 0 ELSE 1 END), 0) FROM invocations",
        )
        .fetch_one(self.state.storage.pool())
        .await
        .unwrap()
    }
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().unwrap().to_string()
}

#[cfg(test)]
mod workflow_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_customer_lifecycle() {
        let h = Harness::new().await;

        // Account with two contacts
        let account = h.ok("crm_account_create", json!({ "name": "Acme" })).await;
        let account_id = id_of(&account);

        let first = h
            .ok(
                "crm_contact_create",
                json!({ "first_name": "Ada", "last_name": "Lovelace", "account_id": account_id }),
            )
            .await;
        let ada = first["contact"]["id"].as_str().unwrap().to_string();
        assert_eq!(first["health"]["score"], 0.25);

        let second = h
            .ok(
                "crm_contact_create",
                json!({ "last_name": "Babbage", "account_id": account_id }),
            )
            .await;
        assert_eq!(second["health"]["factors"]["relationship"], 0.2);
        assert_eq!(second["health"]["score"], 0.35);

        // Website visits
        for started_at in [
            "2024-06-13T09:00:00Z",
            "2024-06-10T16:30:00Z",
            "2024-06-01T08:00:00Z",
        ] {
            h.ok(
                "crm_session_record",
                json!({
                    "visitor_id": "visitor-ada",
                    "contact_id": ada,
                    "page_views": 4,
                    "duration_seconds": 120,
                    "started_at": started_at
                }),
            )
            .await;
        }

        // Support case, closed with a resolution
        let case = h
            .ok(
                "crm_case_create",
                json!({ "subject": "Cannot export", "contact_id": ada, "priority": "High" }),
            )
            .await;
        let case_id = id_of(&case);
        assert_eq!(case["status"], "New");

        let rejected = h
            .call("crm_case_update", json!({ "id": case_id, "status": "Closed" }))
            .await;
        assert!(rejected.is_error);
        assert!(rejected.body["fields"]["resolution"].is_array());

        let closed = h
            .ok(
                "crm_case_update",
                json!({ "id": case_id, "status": "Closed", "resolution": "Patched export" }),
            )
            .await;
        assert_eq!(closed["status"], "Closed");
        assert!(closed["resolved_at"].is_string());

        // Health reflects the visits, the resolved case and the shared account
        let health = h.ok("crm_health_calculate", json!({ "contact_id": ada })).await;
        assert_eq!(
            health["factors"],
            json!({ "activity": 0.09, "support": 0.3, "usage": 0.2, "relationship": 0.2 })
        );
        assert_eq!(health["score"], 0.79);
        assert_eq!(health["risk_level"], "low");
        assert_eq!(health["trend"], "improving");

        let history = h
            .ok("crm_health_history", json!({ "contact_id": ada, "limit": 5 }))
            .await;
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["id"], health["id"]);

        // Deal through the pipeline
        let opp = h
            .ok(
                "crm_opportunity_create",
                json!({
                    "name": "Acme renewal",
                    "amount": 5000.0,
                    "sales_stage": "Proposal/Price Quote",
                    "account_id": account_id,
                    "contact_id": ada
                }),
            )
            .await;
        let opp_id = id_of(&opp);
        assert_eq!(opp["probability"], 65);

        let advanced = h.ok("crm_opportunity_advance", json!({ "id": opp_id })).await;
        assert_eq!(advanced["sales_stage"], "Negotiation/Review");
        assert_eq!(advanced["probability"], 80);

        let pipeline = h.ok("crm_pipeline", json!({})).await;
        assert_eq!(pipeline["summary"]["total_count"], 1);
        assert_eq!(pipeline["summary"]["weighted_amount"], 4000.0);

        let won = h
            .ok(
                "crm_opportunity_set_stage",
                json!({ "id": opp_id, "sales_stage": "Closed Won" }),
            )
            .await;
        assert_eq!(won["probability"], 100);
        assert!(won["date_closed"].is_string());

        let pipeline = h.ok("crm_pipeline", json!({})).await;
        assert_eq!(pipeline["summary"]["total_count"], 0);

        // Quote on the deal
        let quote = h
            .ok(
                "crm_quote_create",
                json!({
                    "name": "Renewal quote",
                    "opportunity_id": opp_id,
                    "discount_percent": 10.0,
                    "line_items": [
                        { "product": "Seats", "quantity": 10.0, "unit_price": 50.0 },
                        { "product": "Support", "unit_price": 200.0 }
                    ]
                }),
            )
            .await;
        assert_eq!(quote["subtotal"], 700.0);
        assert_eq!(quote["total"], 630.0);
        let fetched = h.ok("crm_quote_get", json!({ "id": id_of(&quote) })).await;
        assert_eq!(fetched["line_items"].as_array().unwrap().len(), 2);

        // Lead converted into the contact
        let lead = h
            .ok("crm_lead_create", json!({ "last_name": "Lovelace", "source": "Web" }))
            .await;
        let lead_id = id_of(&lead);

        let missing_contact = h
            .call(
                "crm_lead_update_status",
                json!({ "id": lead_id, "status": "Converted" }),
            )
            .await;
        assert!(missing_contact.is_error);
        assert!(missing_contact.body["fields"]["converted_contact_id"].is_array());

        let converted = h
            .ok(
                "crm_lead_update_status",
                json!({ "id": lead_id, "status": "Converted", "converted_contact_id": ada }),
            )
            .await;
        assert_eq!(converted["status"], "Converted");

        // Analytics over the default window
        let funnel = h.ok("crm_analytics_funnel", json!({})).await;
        let counts: Vec<i64> = funnel["stages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["count"].as_i64().unwrap())
            .collect();
        assert_eq!(counts, vec![1, 1, 1, 1, 1]);
        assert_eq!(funnel["conversion_rates"]["overall"], 100.0);

        let overview = h.ok("crm_analytics_overview", json!(null)).await;
        assert_eq!(overview["visitors"]["sessions"], 3);
        assert_eq!(overview["visitors"]["page_views"], 12);
        assert_eq!(overview["opportunities"]["won_amount"], 5000.0);
        assert_eq!(overview["cases"]["resolution_rate"], 100.0);

        let forecast = h.ok("crm_analytics_forecast", json!({})).await;
        assert_eq!(forecast["month_to_date"], 5000.0);
        assert_eq!(forecast["days_elapsed"], 14);
        assert_eq!(forecast["projected_month_revenue"], 10714.29);
        assert_eq!(forecast["growth_rate"], 0.0);

        let trend = h
            .ok(
                "crm_analytics_trend",
                json!({
                    "metric": "visitors",
                    "start": "2024-06-08T00:00:00Z",
                    "end": "2024-06-14T10:00:00Z"
                }),
            )
            .await;
        assert_eq!(trend["bucket"], "day");
        let values: Vec<f64> = trend["points"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["value"].as_f64().unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_activities_for_contact() {
        let h = Harness::new().await;
        let contact = h.ok("crm_contact_create", json!({ "last_name": "Hopper" })).await;
        let contact_id = contact["contact"]["id"].as_str().unwrap().to_string();

        let call = h
            .ok(
                "crm_activity_log",
                json!({
                    "kind": "Call",
                    "subject": "Kickoff",
                    "direction": "Inbound",
                    "duration_minutes": 30,
                    "contact_id": contact_id
                }),
            )
            .await;
        assert_eq!(call["status"], "Planned");
        assert_eq!(call["direction"], "Inbound");

        let note = h
            .call(
                "crm_activity_log",
                json!({ "kind": "Note", "subject": "Thoughts", "status": "Held" }),
            )
            .await;
        assert!(note.is_error);
        assert!(note.body["fields"]["status"].is_array());

        let listed = h
            .ok("crm_activity_list", json!({ "contact_id": contact_id }))
            .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_contact_update_recalculates_health() {
        let h = Harness::new().await;
        let created = h.ok("crm_contact_create", json!({ "last_name": "Turing" })).await;
        let id = created["contact"]["id"].as_str().unwrap().to_string();

        let renamed = h
            .ok("crm_contact_update", json!({ "id": id, "first_name": "Alan" }))
            .await;
        assert_eq!(renamed["contact"]["first_name"], "Alan");
        assert!(renamed.get("health").is_none());

        let emailed = h
            .ok(
                "crm_contact_update",
                json!({ "id": id, "email": "alan@example.com" }),
            )
            .await;
        assert_eq!(emailed["health"]["supersedes_id"], created["health"]["id"]);
    }
}

#[cfg(test)]
mod argument_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unknown_trend_metric() {
        let h = Harness::new().await;

        let outcome = h
            .call("crm_analytics_trend", json!({ "metric": "weather" }))
            .await;

        assert!(outcome.is_error);
        assert!(outcome.text.contains("metric must be one of"));
    }

    #[tokio::test]
    async fn test_inverted_range() {
        let h = Harness::new().await;

        let outcome = h
            .call(
                "crm_analytics_funnel",
                json!({ "start": "2024-06-10T00:00:00Z", "end": "2024-06-01T00:00:00Z" }),
            )
            .await;

        assert!(outcome.is_error);
        assert!(outcome.text.contains("start must not be after end"));
    }

    #[tokio::test]
    async fn test_century_long_range_is_rejected() {
        let h = Harness::new().await;

        let outcome = h
            .call(
                "crm_analytics_trend",
                json!({
                    "metric": "leads",
                    "start": "1900-01-01T00:00:00Z",
                    "end": "2024-06-01T00:00:00Z"
                }),
            )
            .await;

        assert!(outcome.is_error);
        assert!(outcome.text.contains("range must not exceed 1830 days"));
    }

    #[tokio::test]
    async fn test_five_year_range_is_accepted() {
        let h = Harness::new().await;

        let outcome = h
            .call(
                "crm_analytics_funnel",
                json!({ "start": "2019-06-14T10:00:00Z", "end": "2024-06-14T10:00:00Z" }),
            )
            .await;

        assert!(!outcome.is_error, "{}", outcome.text);
    }

    #[tokio::test]
    async fn test_unknown_opportunity_advance() {
        let h = Harness::new().await;

        let outcome = h
            .call("crm_opportunity_advance", json!({ "id": "nope" }))
            .await;

        assert!(outcome.is_error);
        assert!(outcome.text.contains("Opportunity not found: nope"));
    }
}

#[cfg(test)]
mod invocation_log_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_every_tool_call_is_logged() {
        let h = Harness::new().await;

        h.ok("crm_lead_create", json!({ "last_name": "Logged" })).await;
        h.call("crm_lead_get", json!({ "id": "missing" })).await;
        h.call("crm_not_a_tool", json!({})).await;

        let (total, failed) = h.invocation_counts().await;
        assert_eq!(total, 3);
        assert_eq!(failed, 2);
    }
}
