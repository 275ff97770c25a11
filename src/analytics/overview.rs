//! Dashboard overview figures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::external::ExternalMetrics;
use crate::storage::DateRange;

/// Website traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitorOverview {
    /// Distinct visitor ids.
    pub unique_visitors: i64,
    /// Tracked visits.
    pub sessions: i64,
    /// Pages viewed across all visits.
    pub page_views: i64,
    /// Mean session length in seconds.
    pub average_session_seconds: f64,
}

/// Leads created in the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadOverview {
    /// Leads created in the range.
    pub total: i64,
    /// Every status is present, with 0 when unused.
    pub by_status: BTreeMap<String, i64>,
    /// Count per lead source.
    pub by_source: BTreeMap<String, i64>,
    /// Mean score of scored leads, 0 when none are scored.
    pub average_score: f64,
}

/// Opportunity outcomes.
///
/// Open figures cover deals created in the range; won and lost figures
/// cover deals closed in the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityOverview {
    /// Open deals.
    pub open_count: i64,
    /// Value of open deals.
    pub open_amount: f64,
    /// Deals won.
    pub won_count: i64,
    /// Value of deals won.
    pub won_amount: f64,
    /// Deals lost.
    pub lost_count: i64,
    /// Value of deals lost.
    pub lost_amount: f64,
    /// Won / (won + lost), in percent.
    pub win_rate: f64,
}

/// Cases opened in the range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOverview {
    /// Cases opened in the range.
    pub total: i64,
    /// Every status is present, with 0 when unused.
    pub by_status: BTreeMap<String, i64>,
    /// Every priority is present, with 0 when unused.
    pub by_priority: BTreeMap<String, i64>,
    /// Cases in a resolved status.
    pub resolved: i64,
    /// Resolved / total, in percent.
    pub resolution_rate: f64,
}

/// Everything shown on the dashboard for one range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Reporting window.
    pub range: DateRange,
    /// Website traffic.
    pub visitors: VisitorOverview,
    /// Lead figures.
    pub leads: LeadOverview,
    /// Opportunity outcomes.
    pub opportunities: OpportunityOverview,
    /// Support case figures.
    pub cases: CaseOverview,
    /// Figures from outside the record store, when available.
    pub external: ExternalMetrics,
}

/// Seed a map with every `labels` entry at 0, then apply `counts`.
pub(crate) fn fill_counts<'a>(
    labels: impl IntoIterator<Item = &'a str>,
    counts: Vec<(String, i64)>,
) -> BTreeMap<String, i64> {
    let mut map: BTreeMap<String, i64> = labels
        .into_iter()
        .map(|label| (label.to_string(), 0))
        .collect();
    for (label, count) in counts {
        *map.entry(label).or_insert(0) += count;
    }
    map
}
