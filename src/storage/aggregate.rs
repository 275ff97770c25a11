//! Typed aggregate query primitives.
//!
//! Analytics describes what to count or sum with an [`AggregateQuery`]; the
//! storage backend turns it into SQL. Entities, fields and measures are closed
//! enums so every column name comes from this file, never from a caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Longest window any report covers, in days.
pub const MAX_RANGE_DAYS: i64 = 5 * 366;

/// Inclusive time window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First instant included.
    pub start: DateTime<Utc>,
    /// Last instant included.
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// The `days` days leading up to `now`.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
        }
    }

    /// Whole days spanned.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Whether `at` falls inside the range.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Record kinds that can be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// Tracked website sessions.
    Visitor,
    /// Leads.
    Lead,
    /// Contacts.
    Contact,
    /// Opportunities.
    Opportunity,
    /// Support cases.
    Case,
    /// Logged activities.
    Activity,
}

impl Entity {
    /// Backing table.
    pub(crate) fn table(&self) -> &'static str {
        match self {
            Entity::Visitor => "activity_sessions",
            Entity::Lead => "leads",
            Entity::Contact => "contacts",
            Entity::Opportunity => "opportunities",
            Entity::Case => "cases",
            Entity::Activity => "activities",
        }
    }

    /// Column backing `date_field` for this entity.
    pub(crate) fn date_column(&self, date_field: DateField) -> StorageResult<&'static str> {
        match (self, date_field) {
            (Entity::Visitor, DateField::Created) => Ok("started_at"),
            (_, DateField::Created) => Ok("created_at"),
            (Entity::Opportunity, DateField::Closed) => Ok("date_closed"),
            (Entity::Case, DateField::Closed) => Ok("resolved_at"),
            (entity, DateField::Closed) => Err(StorageError::Query {
                message: format!("{:?} has no close date", entity),
            }),
        }
    }

    /// Column backing `field` for this entity.
    pub(crate) fn field_column(&self, field: Field) -> StorageResult<&'static str> {
        let column = match (self, field) {
            (Entity::Visitor, Field::VisitorId) => "visitor_id",
            (Entity::Visitor, Field::ContactId) => "contact_id",
            (Entity::Visitor, Field::LeadId) => "lead_id",
            (Entity::Lead, Field::Status) => "status",
            (Entity::Lead, Field::Source) => "source",
            (Entity::Lead, Field::AssignedUser) => "assigned_user_id",
            (Entity::Contact, Field::AccountId) => "account_id",
            (Entity::Contact, Field::Source) => "lead_source",
            (Entity::Opportunity, Field::SalesStage) => "sales_stage",
            (Entity::Opportunity, Field::AccountId) => "account_id",
            (Entity::Opportunity, Field::ContactId) => "contact_id",
            (Entity::Opportunity, Field::AssignedUser) => "assigned_user_id",
            (Entity::Case, Field::Status) => "status",
            (Entity::Case, Field::Priority) => "priority",
            (Entity::Case, Field::ContactId) => "contact_id",
            (Entity::Case, Field::AccountId) => "account_id",
            (Entity::Activity, Field::Kind) => "kind",
            (Entity::Activity, Field::Status) => "status",
            (Entity::Activity, Field::ContactId) => "contact_id",
            (entity, field) => {
                return Err(StorageError::Query {
                    message: format!("{:?} has no field {:?}", entity, field),
                })
            }
        };
        Ok(column)
    }

    /// Column backing `measure` for this entity.
    pub(crate) fn measure_column(&self, measure: Measure) -> StorageResult<&'static str> {
        let column = match (self, measure) {
            (Entity::Visitor, Measure::PageViews) => "page_views",
            (Entity::Visitor, Measure::DurationSeconds) => "duration_seconds",
            (Entity::Opportunity, Measure::Amount) => "amount",
            (Entity::Opportunity, Measure::Probability) => "probability",
            (Entity::Opportunity, Measure::WeightedAmount) => "(amount * probability / 100.0)",
            (Entity::Lead, Measure::Score) => "score",
            (Entity::Activity, Measure::DurationMinutes) => "duration_minutes",
            (entity, measure) => {
                return Err(StorageError::Query {
                    message: format!("{:?} has no measure {:?}", entity, measure),
                })
            }
        };
        Ok(column)
    }
}

/// Filterable attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Record status.
    Status,
    /// Opportunity sales stage.
    SalesStage,
    /// Case priority.
    Priority,
    /// Lead/contact source.
    Source,
    /// Owning user.
    AssignedUser,
    /// Session visitor fingerprint.
    VisitorId,
    /// Related contact.
    ContactId,
    /// Related lead.
    LeadId,
    /// Related account.
    AccountId,
    /// Activity kind.
    Kind,
}

/// Numeric columns that can be summed or averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// Opportunity amount.
    Amount,
    /// Opportunity probability.
    Probability,
    /// Opportunity amount × probability / 100.
    WeightedAmount,
    /// Session page views.
    PageViews,
    /// Session length.
    DurationSeconds,
    /// Activity length.
    DurationMinutes,
    /// Lead score.
    Score,
}

/// Which timestamp a date range applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    /// Creation (or session start) time.
    #[default]
    Created,
    /// Close/resolution time.
    Closed,
}

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// `field = value`
    Eq(Field, String),
    /// `field IN (values)`; matches nothing when `values` is empty.
    In(Field, Vec<String>),
    /// `field NOT IN (values)`; matches everything when `values` is empty.
    NotIn(Field, Vec<String>),
    /// `field IS NOT NULL`
    IsSet(Field),
}

/// What to aggregate and over which records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateQuery {
    /// Record kind.
    pub entity: Entity,
    /// Predicates, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Optional window on `date_field`.
    pub range: Option<DateRange>,
    /// Timestamp the window applies to.
    pub date_field: DateField,
}

impl AggregateQuery {
    /// All records of `entity`.
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            conditions: Vec::new(),
            range: None,
            date_field: DateField::Created,
        }
    }

    /// Restrict to a window on the creation time.
    pub fn within(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Restrict to a window on the close time.
    pub fn closed_within(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self.date_field = DateField::Closed;
        self
    }

    /// Add `field = value`.
    pub fn eq(mut self, field: Field, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq(field, value.into()));
        self
    }

    /// Add `field IN (values)`.
    pub fn any_of<I, S>(mut self, field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .push(Condition::In(field, values.into_iter().map(Into::into).collect()));
        self
    }

    /// Add `field NOT IN (values)`.
    pub fn none_of<I, S>(mut self, field: Field, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .push(Condition::NotIn(field, values.into_iter().map(Into::into).collect()));
        self
    }

    /// Add `field IS NOT NULL`.
    pub fn is_set(mut self, field: Field) -> Self {
        self.conditions.push(Condition::IsSet(field));
        self
    }
}

/// A timestamped value returned for bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Record timestamp on the query's date field.
    pub at: DateTime<Utc>,
    /// Measure value, or 1.0 when counting.
    pub value: f64,
}
