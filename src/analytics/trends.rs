//! Time-bucketed series.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::math::round_to;
use crate::storage::{DataPoint, DateRange};

labelled_enum! {
    /// Series that can be charted over time.
    pub enum TrendMetric {
        /// Tracked visitor sessions.
        Visitors => "visitors",
        /// Leads created.
        Leads => "leads",
        /// Opportunities created.
        Opportunities => "opportunities",
        /// Closed Won amount by close date.
        Revenue => "revenue",
        /// Support cases opened.
        Cases => "cases",
    }
}

labelled_enum! {
    /// Width of one series bucket.
    pub enum Bucket {
        /// Calendar day (UTC).
        Day => "day",
        /// ISO week starting Monday.
        Week => "week",
    }
}

impl Bucket {
    /// Daily buckets up to `weekly_after_days` days, weekly beyond.
    pub fn for_range(range: &DateRange, weekly_after_days: i64) -> Self {
        if range.num_days() <= weekly_after_days {
            Bucket::Day
        } else {
            Bucket::Week
        }
    }

    /// First day of the bucket holding `date`.
    pub fn start_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Week => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
        }
    }

    fn step(&self) -> Duration {
        match self {
            Bucket::Day => Duration::days(1),
            Bucket::Week => Duration::weeks(1),
        }
    }
}

/// One bucket of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// First day of the bucket.
    pub period: NaiveDate,
    /// Count or sum for the bucket.
    pub value: f64,
}

/// A chronologically ordered series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    /// What is measured.
    pub metric: TrendMetric,
    /// Bucket width.
    pub bucket: Bucket,
    /// One point per bucket, oldest first.
    pub points: Vec<TrendPoint>,
}

/// Sum `points` into buckets covering `range`. Every bucket between the
/// first and last is present; empty ones hold 0. Points outside `range` are
/// dropped.
pub fn bucket_points(range: &DateRange, bucket: Bucket, points: &[DataPoint]) -> Vec<TrendPoint> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    let last = bucket.start_of(range.end.date_naive());
    let mut cursor = bucket.start_of(range.start.date_naive());
    while cursor <= last {
        totals.insert(cursor, 0.0);
        cursor = cursor + bucket.step();
    }

    for point in points.iter().filter(|p| range.contains(p.at)) {
        *totals
            .entry(bucket.start_of(point.at.date_naive()))
            .or_insert(0.0) += point.value;
    }

    totals
        .into_iter()
        .map(|(period, value)| TrendPoint {
            period,
            value: round_to(value, 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn point(d: u32, hour: u32, value: f64) -> DataPoint {
        DataPoint {
            at: Utc.with_ymd_and_hms(2024, 7, d, hour, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_bucket_selection_threshold() {
        let end = Utc.with_ymd_and_hms(2024, 7, 31, 0, 0, 0).unwrap();
        assert_eq!(
            Bucket::for_range(&DateRange::last_days(end, 90), 90),
            Bucket::Day
        );
        assert_eq!(
            Bucket::for_range(&DateRange::last_days(end, 91), 90),
            Bucket::Week
        );
    }

    #[test]
    fn test_week_starts_monday() {
        // 2024-07-03 is a Wednesday
        assert_eq!(Bucket::Week.start_of(day(3)), day(1));
        assert_eq!(Bucket::Week.start_of(day(1)), day(1));
        assert_eq!(Bucket::Week.start_of(day(7)), day(1));
        assert_eq!(Bucket::Week.start_of(day(8)), day(8));
    }

    #[test]
    fn test_daily_series_fills_gaps() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 4, 23, 0, 0).unwrap(),
        )
        .unwrap();
        let points = vec![point(1, 9, 1.0), point(1, 17, 1.0), point(3, 12, 1.0)];

        let series = bucket_points(&range, Bucket::Day, &points);

        let values: Vec<(NaiveDate, f64)> =
            series.iter().map(|p| (p.period, p.value)).collect();
        assert_eq!(
            values,
            vec![(day(1), 2.0), (day(2), 0.0), (day(3), 1.0), (day(4), 0.0)]
        );
    }

    #[test]
    fn test_weekly_series_sums_values() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2024, 7, 3, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 16, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let points = vec![point(4, 0, 100.0), point(7, 0, 50.5), point(15, 0, 20.0)];

        let series = bucket_points(&range, Bucket::Week, &points);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].period, day(1));
        assert_eq!(series[0].value, 150.5);
        assert_eq!(series[1].value, 0.0);
        assert_eq!(series[2].period, day(15));
        assert_eq!(series[2].value, 20.0);
    }

    #[test]
    fn test_points_outside_range_ignored() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 2, 23, 59, 59).unwrap(),
        )
        .unwrap();
        let series = bucket_points(&range, Bucket::Day, &[point(1, 12, 5.0), point(3, 1, 5.0)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].value, 0.0);
    }
}
