//! Dashboard analytics over the record store.
//!
//! [`AnalyticsAggregator`] turns count/sum/avg primitives from an
//! [`AnalyticsQuery`] into overview, funnel, trend and forecast reports.
//! The arithmetic lives in the pure submodules so it can be tested without
//! a database.

mod external;
mod forecast;
mod funnel;
/// Rounding and zero-safe ratio helpers.
pub mod math;
mod overview;
mod trends;

pub use external::{ExternalMetrics, ExternalMetricsSource, UnavailableMetrics};
pub use forecast::{growth_rate, project_month, MonthWindow, RevenueForecast};
pub use funnel::{build_funnel, ConversionRates, FunnelCounts, FunnelResult, FunnelStage};
pub use overview::{CaseOverview, LeadOverview, OpportunityOverview, Overview, VisitorOverview};
pub use trends::{bucket_points, Bucket, TrendMetric, TrendPoint, TrendSeries};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::dto::ValidationErrors;
use crate::error::{AppError, AppResult};
use crate::pipeline::SalesStage;
use crate::storage::{
    AggregateQuery, AnalyticsQuery, CasePriority, CaseStatus, DateRange, Entity, Field,
    LeadStatus, Measure, MAX_RANGE_DAYS,
};
use math::{percentage, round_to};
use overview::fill_counts;

/// Computes reports from an [`AnalyticsQuery`] backend.
pub struct AnalyticsAggregator<Q: AnalyticsQuery> {
    query: Q,
    external: Arc<dyn ExternalMetricsSource>,
    config: AnalyticsConfig,
}

impl<Q: AnalyticsQuery> AnalyticsAggregator<Q> {
    /// Create an aggregator with no external metrics source.
    pub fn new(query: Q, config: AnalyticsConfig) -> Self {
        Self {
            query,
            external: Arc::new(UnavailableMetrics),
            config,
        }
    }

    /// Use `source` for figures outside the record store.
    pub fn with_external(mut self, source: Arc<dyn ExternalMetricsSource>) -> Self {
        self.external = source;
        self
    }

    /// The configured default window ending at `now`.
    pub fn default_range(&self, now: DateTime<Utc>) -> DateRange {
        DateRange::last_days(now, self.config.default_range_days)
    }

    /// Dashboard overview for `range`.
    pub async fn overview(&self, range: DateRange) -> AppResult<Overview> {
        debug!(start = %range.start, end = %range.end, "Computing overview");

        Ok(Overview {
            range,
            visitors: self.visitor_overview(range).await?,
            leads: self.lead_overview(range).await?,
            opportunities: self.opportunity_overview(range).await?,
            cases: self.case_overview(range).await?,
            external: self.external.fetch(&range).await,
        })
    }

    async fn visitor_overview(&self, range: DateRange) -> AppResult<VisitorOverview> {
        let sessions = AggregateQuery::new(Entity::Visitor).within(range);

        Ok(VisitorOverview {
            unique_visitors: self.query.count_distinct(&sessions, Field::VisitorId).await?,
            sessions: self.query.count(&sessions).await?,
            page_views: self.query.sum(&sessions, Measure::PageViews).await?.round() as i64,
            average_session_seconds: round_to(
                self.query
                    .avg(&sessions, Measure::DurationSeconds)
                    .await?
                    .unwrap_or(0.0),
                1,
            ),
        })
    }

    async fn lead_overview(&self, range: DateRange) -> AppResult<LeadOverview> {
        let leads = AggregateQuery::new(Entity::Lead).within(range);

        Ok(LeadOverview {
            total: self.query.count(&leads).await?,
            by_status: fill_counts(
                LeadStatus::ALL.iter().map(|s| s.as_str()),
                self.query.count_by(&leads, Field::Status).await?,
            ),
            by_source: self.query.count_by(&leads, Field::Source).await?.into_iter().collect(),
            average_score: round_to(
                self.query.avg(&leads, Measure::Score).await?.unwrap_or(0.0),
                1,
            ),
        })
    }

    async fn opportunity_overview(&self, range: DateRange) -> AppResult<OpportunityOverview> {
        let closed_labels = [SalesStage::ClosedWon.as_str(), SalesStage::ClosedLost.as_str()];
        let open = AggregateQuery::new(Entity::Opportunity)
            .within(range)
            .none_of(Field::SalesStage, closed_labels);
        let won = AggregateQuery::new(Entity::Opportunity)
            .closed_within(range)
            .eq(Field::SalesStage, SalesStage::ClosedWon.as_str());
        let lost = AggregateQuery::new(Entity::Opportunity)
            .closed_within(range)
            .eq(Field::SalesStage, SalesStage::ClosedLost.as_str());

        let won_count = self.query.count(&won).await?;
        let lost_count = self.query.count(&lost).await?;

        Ok(OpportunityOverview {
            open_count: self.query.count(&open).await?,
            open_amount: round_to(self.query.sum(&open, Measure::Amount).await?, 2),
            won_count,
            won_amount: round_to(self.query.sum(&won, Measure::Amount).await?, 2),
            lost_count,
            lost_amount: round_to(self.query.sum(&lost, Measure::Amount).await?, 2),
            win_rate: percentage(won_count as f64, (won_count + lost_count) as f64, 1),
        })
    }

    async fn case_overview(&self, range: DateRange) -> AppResult<CaseOverview> {
        let cases = AggregateQuery::new(Entity::Case).within(range);
        let resolved_query = cases
            .clone()
            .any_of(Field::Status, CaseStatus::RESOLVED.iter().map(|s| s.as_str()));

        let total = self.query.count(&cases).await?;
        let resolved = self.query.count(&resolved_query).await?;

        Ok(CaseOverview {
            total,
            by_status: fill_counts(
                CaseStatus::ALL.iter().map(|s| s.as_str()),
                self.query.count_by(&cases, Field::Status).await?,
            ),
            by_priority: fill_counts(
                CasePriority::ALL.iter().map(|p| p.as_str()),
                self.query.count_by(&cases, Field::Priority).await?,
            ),
            resolved,
            resolution_rate: percentage(resolved as f64, total as f64, 1),
        })
    }

    /// Visitor → lead → qualified → opportunity → won funnel for `range`.
    pub async fn funnel(&self, range: DateRange) -> AppResult<FunnelResult> {
        let visitors = self
            .query
            .count_distinct(
                &AggregateQuery::new(Entity::Visitor).within(range),
                Field::VisitorId,
            )
            .await?;
        let leads = AggregateQuery::new(Entity::Lead).within(range);
        let qualified = leads
            .clone()
            .any_of(Field::Status, LeadStatus::QUALIFIED.iter().map(|s| s.as_str()));
        let opportunities = AggregateQuery::new(Entity::Opportunity).within(range);
        let won = opportunities
            .clone()
            .eq(Field::SalesStage, SalesStage::ClosedWon.as_str());

        let counts = FunnelCounts {
            visitors,
            leads: self.query.count(&leads).await?,
            qualified: self.query.count(&qualified).await?,
            opportunities: self.query.count(&opportunities).await?,
            won: self.query.count(&won).await?,
        };
        debug!(?counts, "Funnel counts");

        Ok(build_funnel(counts))
    }

    /// `metric` over `range`, bucketed per day or per week.
    pub async fn trend(&self, metric: TrendMetric, range: DateRange) -> AppResult<TrendSeries> {
        if range.num_days() > MAX_RANGE_DAYS {
            let mut errors = ValidationErrors::new();
            errors.add("range", format!("must not exceed {MAX_RANGE_DAYS} days"));
            return Err(errors.into());
        }
        let bucket = Bucket::for_range(&range, self.config.weekly_bucket_after_days);
        let (query, measure) = match metric {
            TrendMetric::Visitors => (AggregateQuery::new(Entity::Visitor).within(range), None),
            TrendMetric::Leads => (AggregateQuery::new(Entity::Lead).within(range), None),
            TrendMetric::Opportunities => {
                (AggregateQuery::new(Entity::Opportunity).within(range), None)
            }
            TrendMetric::Revenue => (won_revenue(range), Some(Measure::Amount)),
            TrendMetric::Cases => (AggregateQuery::new(Entity::Case).within(range), None),
        };

        let points = self.query.points(&query, measure).await?;

        Ok(TrendSeries {
            metric,
            bucket,
            points: bucket_points(&range, bucket, &points),
        })
    }

    /// Run-rate revenue forecast for the month containing `now`.
    pub async fn forecast(&self, now: DateTime<Utc>) -> AppResult<RevenueForecast> {
        let window = MonthWindow::containing(now).ok_or_else(|| AppError::Internal {
            message: format!("No calendar month around {}", now),
        })?;

        let month_to_date = self
            .query
            .sum(&won_revenue(window.to_date(now)), Measure::Amount)
            .await?;
        let last_month = self
            .query
            .sum(&won_revenue(window.previous()), Measure::Amount)
            .await?;
        let closing_this_month = AggregateQuery::new(Entity::Opportunity)
            .closed_within(window.whole())
            .none_of(
                Field::SalesStage,
                [SalesStage::ClosedWon.as_str(), SalesStage::ClosedLost.as_str()],
            );
        let weighted_pipeline = self
            .query
            .sum(&closing_this_month, Measure::WeightedAmount)
            .await?;

        debug!(
            month_to_date,
            last_month,
            days_elapsed = window.days_elapsed,
            "Forecast inputs"
        );

        Ok(RevenueForecast::compute(
            &window,
            month_to_date,
            last_month,
            weighted_pipeline,
        ))
    }
}

fn won_revenue(range: DateRange) -> AggregateQuery {
    AggregateQuery::new(Entity::Opportunity)
        .closed_within(range)
        .eq(Field::SalesStage, SalesStage::ClosedWon.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Condition, DataPoint, DateField, MockAnalyticsQuery};
    use chrono::{Datelike, TimeZone};

    fn config() -> AnalyticsConfig {
        AnalyticsConfig {
            default_range_days: 30,
            weekly_bucket_after_days: 90,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn has_eq(query: &AggregateQuery, field: Field, value: &str) -> bool {
        query
            .conditions
            .iter()
            .any(|c| matches!(c, Condition::Eq(f, v) if *f == field && v == value))
    }

    #[tokio::test]
    async fn test_funnel_zero_visitors_has_no_errors() {
        let mut query = MockAnalyticsQuery::new();
        query.expect_count_distinct().returning(|_, _| Ok(0));
        query.expect_count().returning(|q| match q.entity {
            Entity::Lead => Ok(5),
            _ => Ok(0),
        });

        let aggregator = AnalyticsAggregator::new(query, config());
        let funnel = aggregator
            .funnel(aggregator.default_range(now()))
            .await
            .unwrap();

        assert!(funnel.stages.iter().all(|s| s.percentage == 0.0));
        assert_eq!(funnel.conversion_rates.visitor_to_lead, 0.0);
        assert_eq!(funnel.conversion_rates.overall, 0.0);
    }

    #[tokio::test]
    async fn test_funnel_uses_qualified_statuses() {
        let mut query = MockAnalyticsQuery::new();
        query.expect_count_distinct().returning(|_, _| Ok(100));
        query.expect_count().returning(|q| {
            let n = match (q.entity, q.conditions.len()) {
                (Entity::Lead, 0) => 40,
                (Entity::Lead, _) => {
                    assert_eq!(
                        q.conditions[0],
                        Condition::In(
                            Field::Status,
                            vec!["Qualified".to_string(), "Converted".to_string()]
                        )
                    );
                    10
                }
                (Entity::Opportunity, 0) => 8,
                (Entity::Opportunity, _) => {
                    assert!(has_eq(q, Field::SalesStage, "Closed Won"));
                    2
                }
                _ => 0,
            };
            Ok(n)
        });

        let aggregator = AnalyticsAggregator::new(query, config());
        let funnel = aggregator
            .funnel(aggregator.default_range(now()))
            .await
            .unwrap();

        assert_eq!(funnel.stages[2].count, 10);
        assert_eq!(funnel.conversion_rates.lead_to_qualified, 25.0);
        assert_eq!(funnel.conversion_rates.qualified_to_opportunity, 80.0);
        assert_eq!(funnel.conversion_rates.opportunity_to_won, 25.0);
        assert_eq!(funnel.conversion_rates.overall, 2.0);
    }

    #[tokio::test]
    async fn test_forecast_counts_revenue_by_close_date() {
        let mut query = MockAnalyticsQuery::new();
        query.expect_sum().returning(|q, measure| {
            assert_eq!(q.date_field, DateField::Closed);
            let range = q.range.unwrap();
            let total = match measure {
                Measure::WeightedAmount => 750.0,
                _ if range.start.month() == 6 => 3000.0,
                _ => 6000.0,
            };
            Ok(total)
        });

        let aggregator = AnalyticsAggregator::new(query, config());
        let forecast = aggregator.forecast(now()).await.unwrap();

        assert_eq!(forecast.month_to_date, 3000.0);
        assert_eq!(forecast.days_in_month, 30);
        assert_eq!(forecast.projected_month_revenue, 9000.0);
        assert_eq!(forecast.growth_rate, 50.0);
        assert_eq!(forecast.weighted_pipeline, 750.0);
    }

    #[tokio::test]
    async fn test_trend_revenue_buckets_amounts() {
        let mut query = MockAnalyticsQuery::new();
        query.expect_points().returning(|q, measure| {
            assert_eq!(measure, Some(Measure::Amount));
            assert!(has_eq(q, Field::SalesStage, "Closed Won"));
            Ok(vec![
                DataPoint {
                    at: Utc.with_ymd_and_hms(2024, 6, 9, 8, 0, 0).unwrap(),
                    value: 100.0,
                },
                DataPoint {
                    at: Utc.with_ymd_and_hms(2024, 6, 9, 18, 0, 0).unwrap(),
                    value: 250.0,
                },
            ])
        });

        let aggregator = AnalyticsAggregator::new(query, config());
        let range = DateRange::last_days(now(), 7);
        let series = aggregator.trend(TrendMetric::Revenue, range).await.unwrap();

        assert_eq!(series.bucket, Bucket::Day);
        assert_eq!(series.points.len(), 8);
        let total: f64 = series.points.iter().map(|p| p.value).sum();
        assert_eq!(total, 350.0);
    }

    #[tokio::test]
    async fn test_overview_external_metrics_unavailable() {
        let mut query = MockAnalyticsQuery::new();
        query.expect_count().returning(|_| Ok(0));
        query.expect_count_distinct().returning(|_, _| Ok(0));
        query.expect_count_by().returning(|_, _| Ok(Vec::new()));
        query.expect_sum().returning(|_, _| Ok(0.0));
        query.expect_avg().returning(|_, _| Ok(None));

        let aggregator = AnalyticsAggregator::new(query, config());
        let overview = aggregator
            .overview(aggregator.default_range(now()))
            .await
            .unwrap();

        assert_eq!(overview.external, ExternalMetrics::default());
        assert_eq!(overview.opportunities.win_rate, 0.0);
        assert_eq!(overview.cases.resolution_rate, 0.0);
        assert_eq!(overview.cases.by_status.len(), CaseStatus::ALL.len());
        assert_eq!(overview.visitors.average_session_seconds, 0.0);
    }
}
