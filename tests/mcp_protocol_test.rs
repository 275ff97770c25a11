//! Integration tests for MCP protocol handling
//!
//! Tests JSON-RPC request/response handling through `McpServer` backed by an
//! in-memory store.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crm_insights::server::{JsonRpcRequest, JsonRpcResponse, McpServer, PROTOCOL_VERSION};
use crm_insights::storage::SqliteStorage;
use crm_insights::{AppState, Config, FixedClock};

async fn create_test_server() -> McpServer {
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage");
    let now = Utc.with_ymd_and_hms(2024, 6, 14, 10, 0, 0).unwrap();
    let state =
        AppState::new(Config::default(), storage, None).with_clock(Arc::new(FixedClock(now)));
    McpServer::new(Arc::new(state))
}

/// Parse a raw JSON-RPC line the way the stdio loop does
fn parse_request(raw: &str) -> JsonRpcRequest {
    serde_json::from_str(raw).expect("Failed to parse JSON-RPC request")
}

/// Verify JSON-RPC 2.0 response structure
fn assert_valid_jsonrpc_response(response: &JsonRpcResponse) -> Value {
    let value = serde_json::to_value(response).unwrap();
    assert_eq!(value["jsonrpc"], "2.0", "Invalid JSON-RPC version");
    assert!(
        value.get("result").is_some() ^ value.get("error").is_some(),
        "Response must have exactly one of result or error"
    );
    value
}

#[cfg(test)]
mod initialize_tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_handshake() {
        let server = create_test_server().await;
        let request = parse_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{
                "protocolVersion":"2024-11-05","capabilities":{},
                "clientInfo":{"name":"test-client","version":"1.0.0"}}}"#,
        );

        let response = server.handle_request(request).await.unwrap();
        let value = assert_valid_jsonrpc_response(&response);

        assert_eq!(value["id"], 1);
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["result"]["serverInfo"]["name"], "crm-insights");
        assert!(value["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_initialized_notification_is_silent() {
        let server = create_test_server().await;
        let request =
            parse_request(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);

        assert!(server.handle_request(request).await.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let server = create_test_server().await;
        let request = parse_request(r#"{"jsonrpc":"2.0","id":"p-1","method":"ping"}"#);

        let response = server.handle_request(request).await.unwrap();
        let value = assert_valid_jsonrpc_response(&response);
        assert_eq!(value["id"], "p-1");
        assert_eq!(value["result"], json!({}));
    }
}

#[cfg(test)]
mod tools_list_tests {
    use super::*;

    #[tokio::test]
    async fn test_tools_list_advertises_crm_tools() {
        let server = create_test_server().await;
        let request = parse_request(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#);

        let response = server.handle_request(request).await.unwrap();
        let value = assert_valid_jsonrpc_response(&response);
        let tools = value["result"]["tools"].as_array().unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        for expected in [
            "crm_contact_create",
            "crm_health_calculate",
            "crm_pipeline",
            "crm_analytics_funnel",
            "crm_analytics_forecast",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
        for tool in tools {
            assert!(tool["inputSchema"].is_object(), "{} has no schema", tool["name"]);
        }
    }
}

#[cfg(test)]
mod tools_call_tests {
    use super::*;

    fn call(id: i64, name: &str, arguments: Value) -> JsonRpcRequest {
        serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }))
        .unwrap()
    }

    fn text_of(value: &Value) -> &str {
        value["result"]["content"][0]["text"].as_str().unwrap()
    }

    #[tokio::test]
    async fn test_successful_call_returns_text_content() {
        let server = create_test_server().await;

        let response = server
            .handle_request(call(3, "crm_lead_create", json!({ "last_name": "Ng" })))
            .await
            .unwrap();
        let value = assert_valid_jsonrpc_response(&response);

        assert_eq!(value["result"]["content"][0]["type"], "text");
        assert!(value["result"].get("isError").is_none());
        let lead: Value = serde_json::from_str(text_of(&value)).unwrap();
        assert_eq!(lead["status"], "New");
    }

    #[tokio::test]
    async fn test_tool_failure_is_result_not_protocol_error() {
        let server = create_test_server().await;

        let response = server
            .handle_request(call(4, "crm_lead_get", json!({ "id": "missing" })))
            .await
            .unwrap();
        let value = assert_valid_jsonrpc_response(&response);

        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["isError"], true);
        assert!(text_of(&value).contains("Lead not found: missing"));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_reported() {
        let server = create_test_server().await;

        let response = server
            .handle_request(call(5, "crm_health_history", json!({ "limit": "ten" })))
            .await
            .unwrap();
        let value = assert_valid_jsonrpc_response(&response);

        assert_eq!(value["result"]["isError"], true);
        assert!(text_of(&value).contains("crm_health_history"));
    }

    #[tokio::test]
    async fn test_malformed_call_params() {
        let server = create_test_server().await;
        let request = parse_request(
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"arguments":{}}}"#,
        );

        let response = server.handle_request(request).await.unwrap();
        let value = assert_valid_jsonrpc_response(&response);
        assert_eq!(value["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = create_test_server().await;
        let request = parse_request(r#"{"jsonrpc":"2.0","id":7,"method":"prompts/list"}"#);

        let response = server.handle_request(request).await.unwrap();
        let value = assert_valid_jsonrpc_response(&response);
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["id"], 7);
    }
}
