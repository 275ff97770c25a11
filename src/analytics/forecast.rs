//! Run-rate revenue projection for the current month.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::math::{percentage, ratio, round_to};
use crate::storage::DateRange;

/// Calendar month around an instant, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    /// Midnight on the 1st of the month.
    pub start: DateTime<Utc>,
    /// Midnight on the 1st of the next month.
    pub next_start: DateTime<Utc>,
    /// Midnight on the 1st of the previous month.
    pub previous_start: DateTime<Utc>,
    /// Days in the month.
    pub days_in_month: u32,
    /// Days elapsed, counting today.
    pub days_elapsed: u32,
}

impl MonthWindow {
    /// The month containing `now`. `None` only at the edges of the
    /// representable calendar.
    pub fn containing(now: DateTime<Utc>) -> Option<Self> {
        let today = now.date_naive();
        let first = today.with_day(1)?;
        let next = shift_month(first, 1)?;
        let previous = shift_month(first, -1)?;

        Some(Self {
            start: midnight(first)?,
            next_start: midnight(next)?,
            previous_start: midnight(previous)?,
            days_in_month: (next - first).num_days() as u32,
            days_elapsed: today.day(),
        })
    }

    /// From the 1st of the month up to `now`.
    pub fn to_date(&self, now: DateTime<Utc>) -> DateRange {
        DateRange {
            start: self.start,
            end: now,
        }
    }

    /// The whole current month.
    pub fn whole(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.next_start - Duration::microseconds(1),
        }
    }

    /// The whole previous month.
    pub fn previous(&self) -> DateRange {
        DateRange {
            start: self.previous_start,
            end: self.start - Duration::microseconds(1),
        }
    }
}

fn shift_month(first: NaiveDate, delta: i32) -> Option<NaiveDate> {
    let index = first.year() * 12 + first.month0() as i32 + delta;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// (so_far / days_elapsed) × days_in_month, 0 before any day has elapsed.
pub fn project_month(so_far: f64, days_elapsed: u32, days_in_month: u32) -> f64 {
    ratio(so_far, f64::from(days_elapsed)) * f64::from(days_in_month)
}

/// Percent change from `previous` to `projected`, 0 when `previous` is 0.
pub fn growth_rate(projected: f64, previous: f64) -> f64 {
    percentage(projected - previous, previous, 1)
}

/// Revenue outlook for the current month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueForecast {
    /// Closed Won amount so far this month.
    pub month_to_date: f64,
    /// Days of the month so far, counting today.
    pub days_elapsed: u32,
    /// Length of the current month.
    pub days_in_month: u32,
    /// Run-rate projection for the full month.
    pub projected_month_revenue: f64,
    /// Closed Won amount last month.
    pub last_month_revenue: f64,
    /// Projected vs last month, in percent.
    pub growth_rate: f64,
    /// Weighted amount of open deals expected to close this month.
    pub weighted_pipeline: f64,
}

impl RevenueForecast {
    /// Assemble the forecast from month totals.
    pub fn compute(
        window: &MonthWindow,
        month_to_date: f64,
        last_month_revenue: f64,
        weighted_pipeline: f64,
    ) -> Self {
        let projected = project_month(month_to_date, window.days_elapsed, window.days_in_month);
        Self {
            month_to_date: round_to(month_to_date, 2),
            days_elapsed: window.days_elapsed,
            days_in_month: window.days_in_month,
            projected_month_revenue: round_to(projected, 2),
            last_month_revenue: round_to(last_month_revenue, 2),
            growth_rate: growth_rate(projected, last_month_revenue),
            weighted_pipeline: round_to(weighted_pipeline, 2),
        }
    }
}
