//! Visitor to closed-deal conversion funnel.

use serde::{Deserialize, Serialize};

use super::math::percentage;

/// Raw counts feeding the funnel, one per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelCounts {
    /// Unique website visitors.
    pub visitors: i64,
    /// Leads created.
    pub leads: i64,
    /// Leads qualified or converted.
    pub qualified: i64,
    /// Opportunities created.
    pub opportunities: i64,
    /// Opportunities won.
    pub won: i64,
}

/// One funnel step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    /// Step name.
    pub name: String,
    /// Records reaching the step.
    pub count: i64,
    /// Share of visitors reaching the step, in percent.
    pub percentage: f64,
}

/// Step-to-step conversion, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRates {
    /// Visitors who became leads.
    pub visitor_to_lead: f64,
    /// Leads that qualified.
    pub lead_to_qualified: f64,
    /// Qualified leads that became opportunities.
    pub qualified_to_opportunity: f64,
    /// Opportunities won.
    pub opportunity_to_won: f64,
    /// Won deals per visitor.
    pub overall: f64,
}

/// Funnel stages plus conversion between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelResult {
    /// Stages in funnel order.
    pub stages: Vec<FunnelStage>,
    /// Rates between adjacent stages.
    pub conversion_rates: ConversionRates,
}

/// Build the funnel from stage counts. Every percentage is rounded to one
/// decimal and is 0 when its divisor is 0.
pub fn build_funnel(counts: FunnelCounts) -> FunnelResult {
    let visitors = counts.visitors as f64;
    let steps = [
        ("visitors", counts.visitors),
        ("leads", counts.leads),
        ("qualified", counts.qualified),
        ("opportunities", counts.opportunities),
        ("won", counts.won),
    ];

    let stages = steps
        .iter()
        .map(|(name, count)| FunnelStage {
            name: name.to_string(),
            count: *count,
            percentage: percentage(*count as f64, visitors, 1),
        })
        .collect();

    let rate = |part: i64, whole: i64| percentage(part as f64, whole as f64, 1);

    FunnelResult {
        stages,
        conversion_rates: ConversionRates {
            visitor_to_lead: rate(counts.leads, counts.visitors),
            lead_to_qualified: rate(counts.qualified, counts.leads),
            qualified_to_opportunity: rate(counts.opportunities, counts.qualified),
            opportunity_to_won: rate(counts.won, counts.opportunities),
            overall: rate(counts.won, counts.visitors),
        },
    }
}
