//! MCP protocol implementation for JSON-RPC 2.0 communication.
//!
//! This module provides the core MCP server implementation including:
//! - JSON-RPC 2.0 request/response handling
//! - Tool definitions and schemas
//! - Stdio-based server communication

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};
use crate::analytics::TrendMetric;
use crate::dto::Direction;
use crate::error::McpError;
use crate::pipeline::SalesStage;
use crate::storage::{ActivityKind, CasePriority, LeadSource, LeadStatus};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Name reported in the initialize handshake.
pub const SERVER_NAME: &str = "crm-insights";

/// MCP protocol version spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request identifier (None for notifications).
    pub id: Option<Value>,
    /// The method name to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    /// Request identifier, null when the request could not be read.
    pub id: Value,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server identification returned during initialization.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

/// Capabilities advertised to clients.
#[derive(Debug, Serialize)]
pub struct Capabilities {
    /// Tool-related capabilities.
    pub tools: ToolCapabilities,
}

/// Tool-specific capabilities.
#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// Whether the tool list can change at runtime.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Result of the initialize handshake.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    /// Protocol version.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: Capabilities,
    /// Server identification.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// Tool definition with its JSON Schema.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    /// Tool name used in `tools/call`.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema for the arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters for a tools/call request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    /// The name of the tool to invoke.
    pub name: String,
    /// Optional arguments for the tool.
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Content item within a tool result.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    /// The content type, always "text".
    #[serde(rename = "type")]
    pub content_type: String,
    /// The text content of the result.
    pub text: String,
}

/// Result of a tool invocation.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    /// The result content items.
    pub content: Vec<ToolResultContent>,
    /// Whether the result represents an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP server over stdio.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Read newline-delimited requests from stdin until EOF.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("CRM insights server starting...");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            // Notifications get no response
            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Handle one request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" => {
                debug!("Received initialized notification");
                None
            }
            "notifications/cancelled" => {
                debug!("Received cancelled notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");
        JsonRpcResponse::success(id, json!({ "tools": all_tools() }))
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (text, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (text, None)
                }
                Err(e) => (tool_error_text(&e), Some(true)),
            };

        let tool_result = ToolCallResult {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text,
            }],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// Text body of a failed tool call. Validation failures carry the field map
/// as JSON so callers can show per-field messages.
pub fn tool_error_text(err: &McpError) -> String {
    match err {
        McpError::Validation(errors) => {
            let body = json!({
                "error": "Validation failed",
                "fields": errors,
            });
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| format!("Error: {}", err))
        }
        other => format!("Error: {}", other),
    }
}

/// Every tool the server exposes.
pub fn all_tools() -> Vec<Tool> {
    vec![
        // Leads
        get_lead_create_tool(),
        get_lead_get_tool(),
        get_lead_update_status_tool(),
        // Accounts and contacts
        get_account_create_tool(),
        get_account_get_tool(),
        get_contact_create_tool(),
        get_contact_get_tool(),
        get_contact_update_tool(),
        // Opportunities
        get_opportunity_create_tool(),
        get_opportunity_get_tool(),
        get_opportunity_set_stage_tool(),
        get_opportunity_advance_tool(),
        get_pipeline_tool(),
        // Cases
        get_case_create_tool(),
        get_case_get_tool(),
        get_case_update_tool(),
        // Activities, quotes and sessions
        get_activity_log_tool(),
        get_activity_list_tool(),
        get_quote_create_tool(),
        get_quote_get_tool(),
        get_session_record_tool(),
        // Health
        get_health_calculate_tool(),
        get_health_history_tool(),
        get_health_recalculate_all_tool(),
        // Analytics
        get_analytics_overview_tool(),
        get_analytics_funnel_tool(),
        get_analytics_trend_tool(),
        get_analytics_forecast_tool(),
    ]
}

fn id_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "description": description }
        },
        "required": ["id"],
        "additionalProperties": false
    })
}

fn range_properties() -> Value {
    json!({
        "start": {
            "type": "string",
            "format": "date-time",
            "description": "Window start (RFC 3339). Defaults to the configured window before end"
        },
        "end": {
            "type": "string",
            "format": "date-time",
            "description": "Window end (RFC 3339). Defaults to now"
        }
    })
}

fn get_lead_create_tool() -> Tool {
    Tool {
        name: "crm_lead_create".to_string(),
        description: "Capture a new lead. Status defaults to New.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "first_name": { "type": "string" },
                "last_name": { "type": "string" },
                "email": { "type": "string" },
                "phone": { "type": "string" },
                "company": { "type": "string" },
                "status": { "type": "string", "enum": LeadStatus::ALL.iter().map(LeadStatus::as_str).collect::<Vec<_>>() },
                "source": { "type": "string", "enum": LeadSource::ALL.iter().map(LeadSource::as_str).collect::<Vec<_>>() },
                "score": { "type": "integer", "minimum": 0, "maximum": 100 },
                "assigned_user_id": { "type": "string" }
            },
            "required": ["last_name"],
            "additionalProperties": false
        }),
    }
}

fn get_lead_get_tool() -> Tool {
    Tool {
        name: "crm_lead_get".to_string(),
        description: "Fetch a lead by id.".to_string(),
        input_schema: id_schema("Lead id"),
    }
}

fn get_lead_update_status_tool() -> Tool {
    Tool {
        name: "crm_lead_update_status".to_string(),
        description: "Move a lead to a new status. Converting requires the resulting contact."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "status": { "type": "string", "enum": LeadStatus::ALL.iter().map(LeadStatus::as_str).collect::<Vec<_>>() },
                "converted_contact_id": { "type": "string" }
            },
            "required": ["id", "status"],
            "additionalProperties": false
        }),
    }
}

fn get_account_create_tool() -> Tool {
    Tool {
        name: "crm_account_create".to_string(),
        description: "Create an account.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "industry": { "type": "string" },
                "website": { "type": "string", "description": "http:// or https:// URL" }
            },
            "required": ["name"],
            "additionalProperties": false
        }),
    }
}

fn get_account_get_tool() -> Tool {
    Tool {
        name: "crm_account_get".to_string(),
        description: "Fetch an account by id.".to_string(),
        input_schema: id_schema("Account id"),
    }
}

fn get_contact_create_tool() -> Tool {
    Tool {
        name: "crm_contact_create".to_string(),
        description: "Create a contact and compute its first health score.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "first_name": { "type": "string" },
                "last_name": { "type": "string" },
                "email": { "type": "string" },
                "phone": { "type": "string" },
                "title": { "type": "string" },
                "account_id": { "type": "string" },
                "lead_source": { "type": "string" }
            },
            "required": ["last_name"],
            "additionalProperties": false
        }),
    }
}

fn get_contact_get_tool() -> Tool {
    Tool {
        name: "crm_contact_get".to_string(),
        description: "Fetch a contact by id.".to_string(),
        input_schema: id_schema("Contact id"),
    }
}

fn get_contact_update_tool() -> Tool {
    Tool {
        name: "crm_contact_update".to_string(),
        description: "Partially update a contact. An empty string clears an optional field. \
            Changing account, email or phone recalculates the health score."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "first_name": { "type": "string" },
                "last_name": { "type": "string" },
                "email": { "type": "string" },
                "phone": { "type": "string" },
                "title": { "type": "string" },
                "account_id": { "type": "string" },
                "lead_source": { "type": "string" }
            },
            "required": ["id"],
            "additionalProperties": false
        }),
    }
}

fn get_opportunity_create_tool() -> Tool {
    Tool {
        name: "crm_opportunity_create".to_string(),
        description: "Create an opportunity. Probability defaults from the sales stage."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "amount": { "type": "number", "minimum": 0 },
                "sales_stage": { "type": "string", "enum": SalesStage::ALL.iter().map(SalesStage::as_str).collect::<Vec<_>>() },
                "probability": { "type": "integer", "minimum": 0, "maximum": 100 },
                "account_id": { "type": "string" },
                "contact_id": { "type": "string" },
                "date_closed": { "type": "string", "format": "date-time" },
                "assigned_user_id": { "type": "string" }
            },
            "required": ["name", "amount"],
            "additionalProperties": false
        }),
    }
}

fn get_opportunity_get_tool() -> Tool {
    Tool {
        name: "crm_opportunity_get".to_string(),
        description: "Fetch an opportunity by id.".to_string(),
        input_schema: id_schema("Opportunity id"),
    }
}

fn get_opportunity_set_stage_tool() -> Tool {
    Tool {
        name: "crm_opportunity_set_stage".to_string(),
        description: "Move an opportunity to a sales stage.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "sales_stage": { "type": "string", "enum": SalesStage::ALL.iter().map(SalesStage::as_str).collect::<Vec<_>>() },
                "probability": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 100,
                    "description": "Overrides the stage default"
                }
            },
            "required": ["id", "sales_stage"],
            "additionalProperties": false
        }),
    }
}

fn get_opportunity_advance_tool() -> Tool {
    Tool {
        name: "crm_opportunity_advance".to_string(),
        description: "Advance an opportunity to the next sales stage. Closed deals stay put."
            .to_string(),
        input_schema: id_schema("Opportunity id"),
    }
}

fn get_pipeline_tool() -> Tool {
    Tool {
        name: "crm_pipeline".to_string(),
        description: "Open opportunities grouped by stage with counts, amounts and weighted amounts."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

fn get_case_create_tool() -> Tool {
    Tool {
        name: "crm_case_create".to_string(),
        description: "Open a support case. Text is scored for sentiment when enabled."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "subject": { "type": "string" },
                "description": { "type": "string" },
                "contact_id": { "type": "string" },
                "account_id": { "type": "string" },
                "status": { "type": "string" },
                "priority": { "type": "string", "enum": CasePriority::ALL.iter().map(CasePriority::as_str).collect::<Vec<_>>() },
                "case_type": { "type": "string" },
                "resolution": { "type": "string" }
            },
            "required": ["subject"],
            "additionalProperties": false
        }),
    }
}

fn get_case_get_tool() -> Tool {
    Tool {
        name: "crm_case_get".to_string(),
        description: "Fetch a case by id.".to_string(),
        input_schema: id_schema("Case id"),
    }
}

fn get_case_update_tool() -> Tool {
    Tool {
        name: "crm_case_update".to_string(),
        description: "Partially update a case. Closing requires a resolution.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "subject": { "type": "string" },
                "description": { "type": "string" },
                "status": { "type": "string" },
                "priority": { "type": "string", "enum": CasePriority::ALL.iter().map(CasePriority::as_str).collect::<Vec<_>>() },
                "case_type": { "type": "string" },
                "resolution": { "type": "string" }
            },
            "required": ["id"],
            "additionalProperties": false
        }),
    }
}

fn get_activity_log_tool() -> Tool {
    Tool {
        name: "crm_activity_log".to_string(),
        description: "Log a task, call, meeting, note, email or generic activity.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "kind": { "type": "string", "enum": ActivityKind::ALL.iter().map(ActivityKind::as_str).collect::<Vec<_>>() },
                "subject": { "type": "string" },
                "status": { "type": "string" },
                "priority": { "type": "string" },
                "direction": { "type": "string", "enum": Direction::ALL.iter().map(Direction::as_str).collect::<Vec<_>>() },
                "duration_minutes": { "type": "integer", "minimum": 0 },
                "starts_at": { "type": "string", "format": "date-time" },
                "ends_at": { "type": "string", "format": "date-time" },
                "contact_id": { "type": "string" },
                "parent_type": { "type": "string" },
                "parent_id": { "type": "string" },
                "body": { "type": "string" }
            },
            "required": ["kind", "subject"],
            "additionalProperties": false
        }),
    }
}

fn get_activity_list_tool() -> Tool {
    Tool {
        name: "crm_activity_list".to_string(),
        description: "Activities logged against a contact, newest first.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "contact_id": { "type": "string" }
            },
            "required": ["contact_id"],
            "additionalProperties": false
        }),
    }
}

fn get_quote_create_tool() -> Tool {
    Tool {
        name: "crm_quote_create".to_string(),
        description: "Create a quote. Total is the line subtotal less the discount percentage."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "opportunity_id": { "type": "string" },
                "stage": { "type": "string" },
                "line_items": {
                    "type": "array",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "product": { "type": "string" },
                            "quantity": { "type": "number", "exclusiveMinimum": 0 },
                            "unit_price": { "type": "number", "minimum": 0 }
                        },
                        "required": ["product", "quantity", "unit_price"]
                    }
                },
                "discount_percent": { "type": "number", "minimum": 0, "maximum": 100 },
                "valid_until": { "type": "string", "format": "date" }
            },
            "required": ["name", "line_items"],
            "additionalProperties": false
        }),
    }
}

fn get_quote_get_tool() -> Tool {
    Tool {
        name: "crm_quote_get".to_string(),
        description: "Fetch a quote by id.".to_string(),
        input_schema: id_schema("Quote id"),
    }
}

fn get_session_record_tool() -> Tool {
    Tool {
        name: "crm_session_record".to_string(),
        description: "Record a tracked website visit.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "visitor_id": { "type": "string" },
                "contact_id": { "type": "string" },
                "lead_id": { "type": "string" },
                "page_views": { "type": "integer", "minimum": 0 },
                "duration_seconds": { "type": "integer", "minimum": 0 },
                "started_at": { "type": "string", "format": "date-time" }
            },
            "required": ["visitor_id"],
            "additionalProperties": false
        }),
    }
}

fn get_health_calculate_tool() -> Tool {
    Tool {
        name: "crm_health_calculate".to_string(),
        description: "Compute and store a contact's health score from activity, support, \
            usage and relationship factors."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "contact_id": { "type": "string" }
            },
            "required": ["contact_id"],
            "additionalProperties": false
        }),
    }
}

fn get_health_history_tool() -> Tool {
    Tool {
        name: "crm_health_history".to_string(),
        description: "Stored health scores for a contact, newest first.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "contact_id": { "type": "string" },
                "limit": { "type": "integer", "minimum": 1, "default": 10 }
            },
            "required": ["contact_id"],
            "additionalProperties": false
        }),
    }
}

fn get_health_recalculate_all_tool() -> Tool {
    Tool {
        name: "crm_health_recalculate_all".to_string(),
        description: "Recalculate every contact's health score and report failures.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

fn get_analytics_overview_tool() -> Tool {
    Tool {
        name: "crm_analytics_overview".to_string(),
        description: "Visitors, leads, opportunities and cases for a reporting window."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": range_properties(),
            "additionalProperties": false
        }),
    }
}

fn get_analytics_funnel_tool() -> Tool {
    Tool {
        name: "crm_analytics_funnel".to_string(),
        description: "Visitor to won conversion funnel with stage percentages and conversion rates."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": range_properties(),
            "additionalProperties": false
        }),
    }
}

fn get_analytics_trend_tool() -> Tool {
    let mut properties = range_properties();
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "metric".to_string(),
            json!({
                "type": "string",
                "enum": TrendMetric::ALL.iter().map(TrendMetric::as_str).collect::<Vec<_>>()
            }),
        );
    }

    Tool {
        name: "crm_analytics_trend".to_string(),
        description: "Daily or weekly series for a metric. Windows over 90 days use weeks."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": ["metric"],
            "additionalProperties": false
        }),
    }
}

fn get_analytics_forecast_tool() -> Tool {
    Tool {
        name: "crm_analytics_forecast".to_string(),
        description: "Month-to-date revenue, linear month projection, growth against last \
            month and weighted open pipeline."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}
