//! Opportunity stage engine.
//!
//! A fixed, ordered stage table drives default win probabilities and
//! next-stage transitions. Pipeline grouping partitions open opportunities
//! by stage with raw and probability-weighted amounts.

mod stage;

pub use stage::SalesStage;

use serde::{Deserialize, Serialize};

use crate::analytics::math::{ratio, round_to};
use crate::storage::Opportunity;

/// Probability to store for `stage`: the explicit value when given
/// (capped at 100), otherwise the stage default.
pub fn resolve_probability(stage: SalesStage, explicit: Option<u8>) -> u8 {
    explicit
        .map(|p| p.min(100))
        .unwrap_or_else(|| stage.default_probability())
}

/// The stage after `current`, or `current` itself when there is none.
///
/// Closed stages are terminal: `Closed Won` does not advance into
/// `Closed Lost` even though it sits next to it in the table.
pub fn next_stage(current: SalesStage) -> SalesStage {
    if current.is_closed() {
        return current;
    }
    SalesStage::from_order(current.order() + 1).unwrap_or(current)
}

/// Amounts for one stage of the open pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    /// The stage.
    pub stage: SalesStage,
    /// Table position.
    pub order: u8,
    /// Opportunities currently in the stage.
    pub count: usize,
    /// Sum of amounts.
    pub amount: f64,
    /// Sum of amount × probability / 100.
    pub weighted_amount: f64,
}

/// Totals across every open stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Open opportunities.
    pub total_count: usize,
    /// Sum of open amounts.
    pub total_amount: f64,
    /// Sum of weighted open amounts.
    pub weighted_amount: f64,
    /// Mean open amount (0 with no opportunities).
    pub average_deal_size: f64,
}

/// Open pipeline partitioned by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// One entry per open stage, in stage order, including empty stages.
    pub stages: Vec<PipelineStage>,
    /// Overall totals.
    pub summary: PipelineSummary,
}

/// Group opportunities into the open pipeline. Closed opportunities are ignored.
pub fn group_pipeline(opportunities: &[Opportunity]) -> PipelineResult {
    let mut stages: Vec<PipelineStage> = SalesStage::open_stages()
        .map(|stage| PipelineStage {
            stage,
            order: stage.order(),
            count: 0,
            amount: 0.0,
            weighted_amount: 0.0,
        })
        .collect();

    for opp in opportunities.iter().filter(|o| !o.sales_stage.is_closed()) {
        if let Some(entry) = stages.iter_mut().find(|s| s.stage == opp.sales_stage) {
            entry.count += 1;
            entry.amount += opp.amount;
            entry.weighted_amount += opp.weighted_amount();
        }
    }

    let total_count: usize = stages.iter().map(|s| s.count).sum();
    let total_amount: f64 = stages.iter().map(|s| s.amount).sum();
    let weighted_amount: f64 = stages.iter().map(|s| s.weighted_amount).sum();

    for entry in &mut stages {
        entry.amount = round_to(entry.amount, 2);
        entry.weighted_amount = round_to(entry.weighted_amount, 2);
    }

    PipelineResult {
        stages,
        summary: PipelineSummary {
            total_count,
            total_amount: round_to(total_amount, 2),
            weighted_amount: round_to(weighted_amount, 2),
            average_deal_size: round_to(ratio(total_amount, total_count as f64), 2),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn opp(stage: SalesStage, amount: f64, probability: Option<u8>) -> Opportunity {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut o = Opportunity::new("Deal", stage, amount, now);
        if let Some(p) = probability {
            o.set_stage(stage, Some(p), now);
        }
        o
    }

    #[test]
    fn test_next_stage_advances_by_one() {
        assert_eq!(next_stage(SalesStage::Prospecting), SalesStage::Qualification);
        assert_eq!(
            next_stage(SalesStage::ProposalPriceQuote),
            SalesStage::NegotiationReview
        );
        assert_eq!(next_stage(SalesStage::NegotiationReview), SalesStage::ClosedWon);
    }

    #[test]
    fn test_next_stage_closed_is_terminal() {
        assert_eq!(next_stage(SalesStage::ClosedWon), SalesStage::ClosedWon);
        assert_eq!(next_stage(SalesStage::ClosedLost), SalesStage::ClosedLost);
    }

    #[test]
    fn test_resolve_probability_default_and_override() {
        assert_eq!(resolve_probability(SalesStage::ProposalPriceQuote, None), 65);
        assert_eq!(resolve_probability(SalesStage::ProposalPriceQuote, Some(40)), 40);
        assert_eq!(resolve_probability(SalesStage::Prospecting, Some(0)), 0);
        assert_eq!(resolve_probability(SalesStage::Prospecting, Some(150)), 100);
    }

    #[test]
    fn test_group_pipeline_weighted_amounts() {
        let opps = vec![
            opp(SalesStage::ProposalPriceQuote, 1000.0, None),
            opp(SalesStage::ProposalPriceQuote, 500.0, Some(50)),
            opp(SalesStage::Prospecting, 200.0, None),
            opp(SalesStage::ClosedWon, 9999.0, None),
            opp(SalesStage::ClosedLost, 4444.0, None),
        ];

        let result = group_pipeline(&opps);

        assert_eq!(result.stages.len(), 8);
        let proposal = result
            .stages
            .iter()
            .find(|s| s.stage == SalesStage::ProposalPriceQuote)
            .unwrap();
        assert_eq!(proposal.count, 2);
        assert_eq!(proposal.amount, 1500.0);
        // 1000 * 0.65 + 500 * 0.50
        assert_eq!(proposal.weighted_amount, 900.0);

        assert_eq!(result.summary.total_count, 3);
        assert_eq!(result.summary.total_amount, 1700.0);
        assert_eq!(result.summary.weighted_amount, 920.0);
        assert_eq!(result.summary.average_deal_size, 566.67);
    }

    #[test]
    fn test_group_pipeline_empty() {
        let result = group_pipeline(&[]);
        assert!(result.stages.iter().all(|s| s.count == 0));
        assert_eq!(result.summary.total_count, 0);
        assert_eq!(result.summary.average_deal_size, 0.0);
    }

    #[test]
    fn test_group_pipeline_keeps_stage_order() {
        let result = group_pipeline(&[]);
        let orders: Vec<u8> = result.stages.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
