//! Customer health scoring.
//!
//! A contact's health is a weighted sum of four factors read through the
//! [`HealthQuery`] port:
//!
//! | factor       | weight | input                                   |
//! |--------------|--------|-----------------------------------------|
//! | activity     | 0.3    | sessions in the last 30 days (cap 10)   |
//! | support      | 0.3    | resolved / total cases, last 90 days    |
//! | usage        | 0.2    | any session in the last 7 days          |
//! | relationship | 0.2    | account has more than one contact       |
//!
//! Scores are immutable snapshots. Each new score names the one it
//! supersedes, and the store rejects it if another score landed first.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::math::round_to;
use crate::error::{AppResult, StorageError};
use crate::storage::{
    CaseCounts, Contact, HealthFactors, HealthQuery, HealthScore, RiskLevel, Trend,
};

const ACTIVITY_WEIGHT: f64 = 0.3;
const SUPPORT_WEIGHT: f64 = 0.3;
const USAGE_WEIGHT: f64 = 0.2;
const RELATIONSHIP_WEIGHT: f64 = 0.2;

/// Support contribution when the contact has no recent cases.
const NEUTRAL_SUPPORT: f64 = 0.15;
/// Relationship contribution for a single-contact (or no) account.
const SINGLE_CONTACT_RELATIONSHIP: f64 = 0.1;
/// Sessions in the activity window that earn the full activity weight.
const FULL_ACTIVITY_SESSIONS: f64 = 10.0;
/// Score change beyond which the trend is no longer stable.
const TREND_BAND: f64 = 0.1;

const ACTIVITY_WINDOW_DAYS: i64 = 30;
const SUPPORT_WINDOW_DAYS: i64 = 90;
const USAGE_WINDOW_DAYS: i64 = 7;

/// Attempts before a write conflict is surfaced to the caller.
///
/// Every conflict a calculation sees is caused by a different concurrent
/// writer committing first, so up to this many simultaneous recalculations
/// of one contact all succeed.
pub const MAX_ATTEMPTS: u32 = 8;

/// Query results a score is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthInputs {
    /// Sessions in the last 30 days.
    pub recent_sessions: i64,
    /// Cases in the last 90 days.
    pub cases: CaseCounts,
    /// Whether there was a session in the last 7 days.
    pub active_last_week: bool,
    /// Whether the contact's account has other contacts.
    pub multiple_contacts: bool,
}

/// Weighted factor contributions for `inputs`.
pub fn compute_factors(inputs: &HealthInputs) -> HealthFactors {
    let sessions = inputs.recent_sessions.max(0) as f64;
    let activity = (sessions / FULL_ACTIVITY_SESSIONS).min(1.0) * ACTIVITY_WEIGHT;

    let support = if inputs.cases.total > 0 {
        let resolved = inputs.cases.resolved.clamp(0, inputs.cases.total) as f64;
        resolved / inputs.cases.total as f64 * SUPPORT_WEIGHT
    } else {
        NEUTRAL_SUPPORT
    };

    let usage = if inputs.active_last_week {
        USAGE_WEIGHT
    } else {
        0.0
    };

    let relationship = if inputs.multiple_contacts {
        RELATIONSHIP_WEIGHT
    } else {
        SINGLE_CONTACT_RELATIONSHIP
    };

    HealthFactors {
        activity: round_to(activity, 4),
        support: round_to(support, 4),
        usage,
        relationship,
    }
}

/// Overall score from factors: the sum, two decimals, within [0, 1].
pub fn score_of(factors: &HealthFactors) -> f64 {
    round_to(factors.total(), 2).clamp(0.0, 1.0)
}

/// Risk bucket: below 0.3 is high, below 0.6 medium, otherwise low.
pub fn classify_risk(score: f64) -> RiskLevel {
    if score < 0.3 {
        RiskLevel::High
    } else if score < 0.6 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Trend relative to the previous score. Stable without one.
pub fn classify_trend(score: f64, previous: Option<f64>) -> Trend {
    let Some(previous) = previous else {
        return Trend::Stable;
    };
    let delta = round_to(score - previous, 2);
    if delta > TREND_BAND {
        Trend::Improving
    } else if delta < -TREND_BAND {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Build the snapshot for `contact_id` that would supersede `previous`.
pub fn build_score(
    contact_id: &str,
    inputs: &HealthInputs,
    previous: Option<&HealthScore>,
    now: DateTime<Utc>,
) -> HealthScore {
    let factors = compute_factors(inputs);
    let score = score_of(&factors);

    HealthScore {
        id: Uuid::new_v4().to_string(),
        contact_id: contact_id.to_string(),
        score,
        factors,
        trend: classify_trend(score, previous.map(|p| p.score)),
        risk_level: classify_risk(score),
        supersedes_id: previous.map(|p| p.id.clone()),
        calculated_at: now,
    }
}

/// Calculates and records health scores through a [`HealthQuery`] port.
pub struct HealthScoreCalculator<Q: HealthQuery> {
    query: Q,
}

impl<Q: HealthQuery> HealthScoreCalculator<Q> {
    /// Create a calculator over `query`.
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// Read the factor inputs for `contact` as of `now`.
    pub async fn gather(&self, contact: &Contact, now: DateTime<Utc>) -> AppResult<HealthInputs> {
        let recent_sessions = self
            .query
            .count_contact_sessions_since(&contact.id, now - Duration::days(ACTIVITY_WINDOW_DAYS))
            .await?;
        let cases = self
            .query
            .count_cases_since(&contact.id, now - Duration::days(SUPPORT_WINDOW_DAYS))
            .await?;
        let last_week = self
            .query
            .count_contact_sessions_since(&contact.id, now - Duration::days(USAGE_WINDOW_DAYS))
            .await?;
        let multiple_contacts = match &contact.account_id {
            Some(account_id) => self.query.has_account_multiple_contacts(account_id).await?,
            None => false,
        };

        Ok(HealthInputs {
            recent_sessions,
            cases,
            active_last_week: last_week > 0,
            multiple_contacts,
        })
    }

    /// Compute and store a new score for `contact` as of `now`.
    ///
    /// If another score for the contact is stored between reading the
    /// previous score and inserting, the calculation is redone against the
    /// newer one, up to [`MAX_ATTEMPTS`] attempts.
    pub async fn calculate(&self, contact: &Contact, now: DateTime<Utc>) -> AppResult<HealthScore> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let previous = self.query.latest_health_score(&contact.id).await?;
            let inputs = self.gather(contact, now).await?;
            let score = build_score(&contact.id, &inputs, previous.as_ref(), now);

            debug!(
                contact_id = %contact.id,
                attempt,
                ?inputs,
                score = score.score,
                "Computed health score"
            );

            match self.query.insert_health_score(&score).await {
                Ok(()) => {
                    info!(
                        contact_id = %contact.id,
                        score = score.score,
                        trend = %score.trend,
                        risk_level = %score.risk_level,
                        "Health score recorded"
                    );
                    return Ok(score);
                }
                Err(StorageError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        contact_id = %contact.id,
                        attempt,
                        "Health score superseded concurrently, recalculating"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
