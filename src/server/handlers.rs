use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

use super::SharedState;
use crate::analytics::TrendMetric;
use crate::dto::{
    AccountInput, ActivityInput, CaseInput, CaseUpdate, ContactInput, ContactPatch, LeadInput,
    OpportunityInput, QuoteInput, SessionInput, StageChange,
};
use crate::error::{McpError, McpResult};
use crate::storage::{DateRange, Invocation, MAX_RANGE_DAYS};

/// Route a tool call and record it in the invocation log.
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    let now = state.now();
    let started = Instant::now();
    let invocation = Invocation::new(
        tool_name,
        arguments.clone().unwrap_or(Value::Null),
        now,
    );

    let result = route_tool_call(state, tool_name, arguments, now).await;

    let latency_ms = started.elapsed().as_millis() as i64;
    let invocation = match &result {
        Ok(output) => invocation.success(output.clone(), latency_ms),
        Err(e) => invocation.failure(e.to_string(), latency_ms),
    };
    state.record_invocation(&invocation).await;

    debug!(tool = %tool_name, latency_ms, success = result.is_ok(), "Tool call finished");
    result
}

async fn route_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
    now: DateTime<Utc>,
) -> McpResult<Value> {
    match tool_name {
        // Leads
        "crm_lead_create" => {
            execute_handler(tool_name, arguments, |input: LeadInput| {
                state.leads.create(input, now)
            })
            .await
        }
        "crm_lead_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.leads.get(&p.id).await
            })
            .await
        }
        "crm_lead_update_status" => {
            execute_handler(tool_name, arguments, |p: LeadStatusParams| async move {
                state
                    .leads
                    .update_status(&p.id, &p.status, p.converted_contact_id, now)
                    .await
            })
            .await
        }
        // Accounts and contacts
        "crm_account_create" => {
            execute_handler(tool_name, arguments, |input: AccountInput| {
                state.contacts.create_account(input, now)
            })
            .await
        }
        "crm_account_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.contacts.get_account(&p.id).await
            })
            .await
        }
        "crm_contact_create" => {
            execute_handler(tool_name, arguments, |input: ContactInput| {
                state.contacts.create(input, now)
            })
            .await
        }
        "crm_contact_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.contacts.get(&p.id).await
            })
            .await
        }
        "crm_contact_update" => {
            execute_handler(tool_name, arguments, |p: WithId<ContactPatch>| async move {
                state.contacts.update(&p.id, p.body, now).await
            })
            .await
        }
        // Opportunities
        "crm_opportunity_create" => {
            execute_handler(tool_name, arguments, |input: OpportunityInput| {
                state.opportunities.create(input, now)
            })
            .await
        }
        "crm_opportunity_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.opportunities.get(&p.id).await
            })
            .await
        }
        "crm_opportunity_set_stage" => {
            execute_handler(tool_name, arguments, |p: WithId<StageChange>| async move {
                state.opportunities.set_stage(&p.id, p.body, now).await
            })
            .await
        }
        "crm_opportunity_advance" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.opportunities.advance(&p.id, now).await
            })
            .await
        }
        "crm_pipeline" => execute_result(state.opportunities.pipeline().await),
        // Cases
        "crm_case_create" => {
            execute_handler(tool_name, arguments, |input: CaseInput| {
                state.cases.create(input, now)
            })
            .await
        }
        "crm_case_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.cases.get(&p.id).await
            })
            .await
        }
        "crm_case_update" => {
            execute_handler(tool_name, arguments, |p: WithId<CaseUpdate>| async move {
                state.cases.update(&p.id, p.body, now).await
            })
            .await
        }
        // Activities, quotes and sessions
        "crm_activity_log" => {
            execute_handler(tool_name, arguments, |input: ActivityInput| {
                state.activities.log(input, now)
            })
            .await
        }
        "crm_activity_list" => {
            execute_handler(tool_name, arguments, |p: ContactIdParams| async move {
                state.activities.for_contact(&p.contact_id).await
            })
            .await
        }
        "crm_quote_create" => {
            execute_handler(tool_name, arguments, |input: QuoteInput| {
                state.activities.create_quote(input, now)
            })
            .await
        }
        "crm_quote_get" => {
            execute_handler(tool_name, arguments, |p: IdParams| async move {
                state.activities.get_quote(&p.id).await
            })
            .await
        }
        "crm_session_record" => {
            execute_handler(tool_name, arguments, |input: SessionInput| {
                state.activities.record_session(input, now)
            })
            .await
        }
        // Health
        "crm_health_calculate" => {
            execute_handler(tool_name, arguments, |p: ContactIdParams| async move {
                state.health.calculate(&p.contact_id, now).await
            })
            .await
        }
        "crm_health_history" => {
            execute_handler(tool_name, arguments, |p: HealthHistoryParams| async move {
                state.health.history(&p.contact_id, p.limit).await
            })
            .await
        }
        "crm_health_recalculate_all" => execute_result(state.health.recalculate_all(now).await),
        // Analytics
        "crm_analytics_overview" => {
            let params: RangeParams = parse_optional_arguments(tool_name, arguments)?;
            let range = resolve_range(state, tool_name, &params, now)?;
            execute_result(state.analytics.overview(range).await)
        }
        "crm_analytics_funnel" => {
            let params: RangeParams = parse_optional_arguments(tool_name, arguments)?;
            let range = resolve_range(state, tool_name, &params, now)?;
            execute_result(state.analytics.funnel(range).await)
        }
        "crm_analytics_trend" => {
            let params: TrendParams = parse_arguments(tool_name, arguments)?;
            let metric: TrendMetric =
                params
                    .metric
                    .parse()
                    .map_err(|_| McpError::InvalidParameters {
                        tool_name: tool_name.to_string(),
                        message: format!("metric must be one of: {}", TrendMetric::labels()),
                    })?;
            let range = resolve_range(state, tool_name, &params.range, now)?;
            execute_result(state.analytics.trend(metric, range).await)
        }
        "crm_analytics_forecast" => execute_result(state.analytics.forecast(now).await),
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Parameter types
// ============================================================================

/// Lookup by record id.
#[derive(Debug, Clone, Deserialize)]
pub struct IdParams {
    /// Record id.
    pub id: String,
}

/// Record id plus a flattened request body.
#[derive(Debug, Clone, Deserialize)]
pub struct WithId<T> {
    /// Record id.
    pub id: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub body: T,
}

/// Lookup by contact id.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactIdParams {
    /// Contact id.
    pub contact_id: String,
}

/// Lead status change.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadStatusParams {
    /// Lead id.
    pub id: String,
    /// New status label.
    pub status: String,
    /// Contact the lead became, required when converting.
    #[serde(default)]
    pub converted_contact_id: Option<String>,
}

/// Health history request.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthHistoryParams {
    /// Contact id.
    pub contact_id: String,
    /// Maximum number of scores.
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Optional reporting window. Missing bounds fall back to the configured
/// default window ending now.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RangeParams {
    /// Window start.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Window end.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Trend request.
#[derive(Debug, Clone, Deserialize)]
pub struct TrendParams {
    /// Metric label.
    pub metric: String,
    /// Reporting window.
    #[serde(flatten)]
    pub range: RangeParams,
}

fn resolve_range(
    state: &SharedState,
    tool_name: &str,
    params: &RangeParams,
    now: DateTime<Utc>,
) -> McpResult<DateRange> {
    let invalid = |message: String| McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message,
    };
    let (start, end) = match (params.start, params.end) {
        (None, None) => return Ok(state.analytics.default_range(now)),
        (Some(start), None) => (start, now),
        (None, Some(end)) => {
            let days = Duration::days(state.config.analytics.default_range_days);
            let start = end
                .checked_sub_signed(days)
                .ok_or_else(|| invalid("end is too early".to_string()))?;
            (start, end)
        }
        (Some(start), Some(end)) => (start, end),
    };
    let range = DateRange::new(start, end)
        .ok_or_else(|| invalid("start must not be after end".to_string()))?;
    if range.num_days() > MAX_RANGE_DAYS {
        return Err(invalid(format!("range must not exceed {MAX_RANGE_DAYS} days")));
    }
    Ok(range)
}

// ============================================================================
// Helper functions
// ============================================================================

/// Helper to parse arguments with consistent error handling
fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}

/// Like [`parse_arguments`], but missing arguments mean all defaults.
fn parse_optional_arguments<T: serde::de::DeserializeOwned + Default>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        None | Some(Value::Null) => Ok(T::default()),
        args => parse_arguments(tool_name, args),
    }
}

/// Parse arguments, run a service operation and serialize its result.
///
/// Service errors convert through `From<AppError>`, so validation failures
/// keep their field map.
async fn execute_handler<P, R, E, F, Fut>(
    tool_name: &str,
    arguments: Option<Value>,
    operation: F,
) -> McpResult<Value>
where
    P: serde::de::DeserializeOwned,
    R: Serialize,
    E: Into<McpError>,
    F: FnOnce(P) -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
{
    let params: P = parse_arguments(tool_name, arguments)?;
    execute_result(operation(params).await)
}

fn execute_result<R: Serialize, E: Into<McpError>>(result: Result<R, E>) -> McpResult<Value> {
    let result = result.map_err(Into::into)?;
    serde_json::to_value(result).map_err(McpError::Json)
}
