//! Persistence records and the status vocabularies they carry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::{resolve_probability, SalesStage};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

labelled_enum! {
    /// Lead lifecycle status.
    pub enum LeadStatus {
        /// Just captured.
        New => "New",
        /// Reached out to.
        Contacted => "Contacted",
        /// Confirmed as a sales prospect.
        Qualified => "Qualified",
        /// Turned into a contact.
        Converted => "Converted",
        /// No longer pursued.
        Dead => "Dead",
    }
}

impl LeadStatus {
    /// Statuses that count as qualified in the funnel.
    pub const QUALIFIED: &'static [LeadStatus] = &[LeadStatus::Qualified, LeadStatus::Converted];
}

labelled_enum! {
    /// Where a lead or contact came from.
    pub enum LeadSource {
        /// Company website.
        Web => "Web",
        /// Referred by a customer or partner.
        Referral => "Referral",
        /// Outbound calling.
        ColdCall => "Cold Call",
        /// Marketing email.
        Email => "Email",
        /// Conference or trade show.
        Event => "Event",
        /// Partner channel.
        Partner => "Partner",
        /// Anything else.
        Other => "Other",
    }
}

labelled_enum! {
    /// Support case status.
    pub enum CaseStatus {
        /// Opened, not yet triaged.
        New => "New",
        /// Owned by an agent.
        Assigned => "Assigned",
        /// Waiting on the customer.
        PendingInput => "Pending Input",
        /// Fixed, awaiting confirmation.
        Resolved => "Resolved",
        /// Done.
        Closed => "Closed",
        /// Declined.
        Rejected => "Rejected",
        /// Duplicate of another case.
        Duplicate => "Duplicate",
    }
}

impl CaseStatus {
    /// Statuses that count as resolved for support health.
    pub const RESOLVED: &'static [CaseStatus] = &[CaseStatus::Resolved, CaseStatus::Closed];

    /// Whether moving into this status closes the case.
    pub fn is_closing(&self) -> bool {
        CaseStatus::RESOLVED.contains(self)
    }
}

labelled_enum! {
    /// Support case urgency.
    pub enum CasePriority {
        /// Production down.
        Urgent => "Urgent",
        /// Major impact.
        High => "High",
        /// Default.
        Medium => "Medium",
        /// Minor.
        Low => "Low",
    }
}

labelled_enum! {
    /// Support case category.
    pub enum CaseType {
        /// Usage question.
        Question => "Question",
        /// Defect report.
        Problem => "Problem",
        /// Enhancement request.
        FeatureRequest => "Feature Request",
        /// Billing matter.
        Billing => "Billing",
    }
}

labelled_enum! {
    /// Kind of logged activity.
    pub enum ActivityKind {
        /// To-do item.
        Task => "Task",
        /// Phone call.
        Call => "Call",
        /// Scheduled meeting.
        Meeting => "Meeting",
        /// Free-form note.
        Note => "Note",
        /// Email message.
        Email => "Email",
        /// Any other touchpoint.
        Activity => "Activity",
    }
}

labelled_enum! {
    /// Record type an activity can be attached to.
    pub enum ParentType {
        /// Account record.
        Account => "Accounts",
        /// Contact record.
        Contact => "Contacts",
        /// Lead record.
        Lead => "Leads",
        /// Opportunity record.
        Opportunity => "Opportunities",
        /// Case record.
        Case => "Cases",
    }
}

labelled_enum! {
    /// Quote lifecycle stage.
    pub enum QuoteStage {
        /// Being prepared.
        Draft => "Draft",
        /// Terms being discussed.
        Negotiation => "Negotiation",
        /// Sent to the customer.
        Delivered => "Delivered",
        /// Paused.
        OnHold => "On Hold",
        /// Customer confirmed.
        Confirmed => "Confirmed",
        /// Accepted and closed.
        ClosedAccepted => "Closed Accepted",
        /// Lost.
        ClosedLost => "Closed Lost",
    }
}

labelled_enum! {
    /// Direction of a health score relative to the previous one.
    pub enum Trend {
        /// Up by more than the stability band.
        Improving => "improving",
        /// Down by more than the stability band.
        Declining => "declining",
        /// Within the band, or no previous score.
        Stable => "stable",
    }
}

labelled_enum! {
    /// Churn risk bucket derived from the health score.
    pub enum RiskLevel {
        /// Score of at least 0.6.
        Low => "low",
        /// Score in [0.3, 0.6).
        Medium => "medium",
        /// Score below 0.3.
        High => "high",
    }
}

/// A customer organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: String,
    /// Organisation name.
    pub name: String,
    /// Industry label.
    pub industry: Option<String>,
    /// Public website.
    pub website: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            industry: None,
            website: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the industry
    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }
}

/// A person at a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique contact identifier.
    pub id: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Job title.
    pub title: Option<String>,
    /// Owning account, if any.
    pub account_id: Option<String>,
    /// Acquisition channel.
    pub lead_source: Option<LeadSource>,
    /// When the contact was created.
    pub created_at: DateTime<Utc>,
    /// When the contact was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Create a new contact
    pub fn new(last_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            first_name: None,
            last_name: last_name.into(),
            email: None,
            phone: None,
            title: None,
            account_id: None,
            lead_source: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach to an account
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Set the email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A prospective customer not yet converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique lead identifier.
    pub id: String,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Company name.
    pub company: Option<String>,
    /// Lifecycle status.
    pub status: LeadStatus,
    /// Acquisition channel.
    pub source: Option<LeadSource>,
    /// Lead score (0-100).
    pub score: Option<u8>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
    /// Contact created on conversion.
    pub converted_contact_id: Option<String>,
    /// When the lead was created.
    pub created_at: DateTime<Utc>,
    /// When the lead was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Create a new lead in status `New`
    pub fn new(last_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            first_name: None,
            last_name: last_name.into(),
            email: None,
            phone: None,
            company: None,
            status: LeadStatus::New,
            source: None,
            score: None,
            assigned_user_id: None,
            converted_contact_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the status
    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.status = status;
        self
    }
}

/// A potential deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique opportunity identifier.
    pub id: String,
    /// Deal name.
    pub name: String,
    /// Customer account.
    pub account_id: Option<String>,
    /// Primary contact.
    pub contact_id: Option<String>,
    /// Current sales stage.
    pub sales_stage: SalesStage,
    /// Deal value.
    pub amount: f64,
    /// Win probability (0-100).
    pub probability: u8,
    /// Expected or actual close date.
    pub date_closed: Option<DateTime<Utc>>,
    /// Owning user.
    pub assigned_user_id: Option<String>,
    /// When the opportunity was created.
    pub created_at: DateTime<Utc>,
    /// When the opportunity was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    /// Create a new opportunity with the stage's default probability
    pub fn new(
        name: impl Into<String>,
        sales_stage: SalesStage,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            account_id: None,
            contact_id: None,
            sales_stage,
            amount,
            probability: sales_stage.default_probability(),
            date_closed: None,
            assigned_user_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the close date
    pub fn with_date_closed(mut self, date_closed: DateTime<Utc>) -> Self {
        self.date_closed = Some(date_closed);
        self
    }

    /// Attach to a contact
    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    /// Move to `stage`, taking the stage default probability unless
    /// `probability` is given.
    pub fn set_stage(&mut self, stage: SalesStage, probability: Option<u8>, now: DateTime<Utc>) {
        self.sales_stage = stage;
        self.probability = resolve_probability(stage, probability);
        self.updated_at = now;
    }

    /// amount × probability / 100
    pub fn weighted_amount(&self) -> f64 {
        self.amount * f64::from(self.probability) / 100.0
    }
}

/// A support case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Unique case identifier.
    pub id: String,
    /// Short summary.
    pub subject: String,
    /// Full description.
    pub description: Option<String>,
    /// Reporting contact.
    pub contact_id: Option<String>,
    /// Customer account.
    pub account_id: Option<String>,
    /// Current status.
    pub status: CaseStatus,
    /// Urgency.
    pub priority: CasePriority,
    /// Category.
    pub case_type: Option<CaseType>,
    /// How the case was resolved.
    pub resolution: Option<String>,
    /// Sentiment label from enrichment, if it ran.
    pub sentiment_label: Option<String>,
    /// Sentiment score from enrichment, if it ran.
    pub sentiment_score: Option<f64>,
    /// When the case entered a resolved status.
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the case was created.
    pub created_at: DateTime<Utc>,
    /// When the case was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Create a new case in status `New`
    pub fn new(subject: impl Into<String>, priority: CasePriority, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            subject: subject.into(),
            description: None,
            contact_id: None,
            account_id: None,
            status: CaseStatus::New,
            priority,
            case_type: None,
            resolution: None,
            sentiment_label: None,
            sentiment_score: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach to a contact
    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    /// Set the status, stamping `resolved_at` when it closes the case
    pub fn with_status(mut self, status: CaseStatus, now: DateTime<Utc>) -> Self {
        self.status = status;
        if status.is_closing() && self.resolved_at.is_none() {
            self.resolved_at = Some(now);
        }
        self
    }
}

/// A logged touchpoint: task, call, meeting, note or email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Unique activity identifier.
    pub id: String,
    /// What kind of activity this is.
    pub kind: ActivityKind,
    /// Short summary.
    pub subject: String,
    /// Kind-specific status label.
    pub status: Option<String>,
    /// Priority label (tasks).
    pub priority: Option<String>,
    /// Inbound/Outbound (calls, emails).
    pub direction: Option<String>,
    /// Length in minutes (calls, meetings).
    pub duration_minutes: Option<i64>,
    /// Start or due time.
    pub starts_at: Option<DateTime<Utc>>,
    /// End time.
    pub ends_at: Option<DateTime<Utc>>,
    /// Contact involved.
    pub contact_id: Option<String>,
    /// Related record type.
    pub parent_type: Option<ParentType>,
    /// Related record id.
    pub parent_id: Option<String>,
    /// Body text or description.
    pub body: Option<String>,
    /// When the activity was logged.
    pub created_at: DateTime<Utc>,
}

/// One priced line on a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteLineItem {
    /// Product or service name.
    pub product: String,
    /// Units.
    pub quantity: f64,
    /// Price per unit.
    pub unit_price: f64,
}

impl QuoteLineItem {
    /// quantity × unit price
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// A priced offer attached to an opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Unique quote identifier.
    pub id: String,
    /// Quote title.
    pub name: String,
    /// Opportunity being quoted.
    pub opportunity_id: Option<String>,
    /// Lifecycle stage.
    pub stage: QuoteStage,
    /// Priced lines.
    pub line_items: Vec<QuoteLineItem>,
    /// Sum of line totals.
    pub subtotal: f64,
    /// Discount applied to the subtotal (0-100).
    pub discount_percent: f64,
    /// Subtotal after discount.
    pub total: f64,
    /// Last day the offer holds.
    pub valid_until: Option<NaiveDate>,
    /// When the quote was created.
    pub created_at: DateTime<Utc>,
}

/// A tracked website visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySession {
    /// Unique session identifier.
    pub id: String,
    /// Anonymous visitor fingerprint.
    pub visitor_id: String,
    /// Identified contact, if known.
    pub contact_id: Option<String>,
    /// Identified lead, if known.
    pub lead_id: Option<String>,
    /// Pages viewed.
    pub page_views: i64,
    /// Time on site.
    pub duration_seconds: i64,
    /// When the visit began.
    pub started_at: DateTime<Utc>,
}

impl ActivitySession {
    /// Create a new session for a visitor
    pub fn new(visitor_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            visitor_id: visitor_id.into(),
            contact_id: None,
            lead_id: None,
            page_views: 1,
            duration_seconds: 0,
            started_at,
        }
    }

    /// Attribute the session to a contact
    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact_id = Some(contact_id.into());
        self
    }

    /// Set engagement figures
    pub fn with_engagement(mut self, page_views: i64, duration_seconds: i64) -> Self {
        self.page_views = page_views;
        self.duration_seconds = duration_seconds;
        self
    }
}

/// Weighted contribution of each health factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthFactors {
    /// Recent session volume (max 0.3).
    pub activity: f64,
    /// Case resolution ratio (max 0.3).
    pub support: f64,
    /// Session in the last week (max 0.2).
    pub usage: f64,
    /// Breadth of the account relationship (max 0.2).
    pub relationship: f64,
}

impl HealthFactors {
    /// Sum of the four contributions.
    pub fn total(&self) -> f64 {
        self.activity + self.support + self.usage + self.relationship
    }
}

/// Immutable health snapshot for a contact. Superseded, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    /// Unique score identifier.
    pub id: String,
    /// Scored contact.
    pub contact_id: String,
    /// Overall score in [0, 1], two decimals.
    pub score: f64,
    /// Per-factor breakdown.
    pub factors: HealthFactors,
    /// Direction relative to the superseded score.
    pub trend: Trend,
    /// Risk bucket.
    pub risk_level: RiskLevel,
    /// Score this one replaces, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supersedes_id: Option<String>,
    /// When the score was calculated.
    pub calculated_at: DateTime<Utc>,
}

/// Case totals for a contact over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCounts {
    /// Cases opened in the window.
    pub total: i64,
    /// Of those, cases in a resolved status.
    pub resolved: i64,
}

/// Audit record for a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique invocation identifier.
    pub id: String,
    /// Tool that was called.
    pub tool_name: String,
    /// Arguments as received.
    pub input: serde_json::Value,
    /// Result, when the call succeeded.
    pub output: Option<serde_json::Value>,
    /// Wall time spent.
    pub latency_ms: Option<i64>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Error message, when it failed.
    pub error: Option<String>,
    /// When the call was made.
    pub created_at: DateTime<Utc>,
}

impl Invocation {
    /// Start an invocation record
    pub fn new(
        tool_name: impl Into<String>,
        input: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            tool_name: tool_name.into(),
            input,
            output: None,
            latency_ms: None,
            success: false,
            error: None,
            created_at: now,
        }
    }

    /// Mark as successful
    pub fn success(mut self, output: serde_json::Value, latency_ms: i64) -> Self {
        self.output = Some(output);
        self.latency_ms = Some(latency_ms);
        self.success = true;
        self
    }

    /// Mark as failed
    pub fn failure(mut self, error: impl Into<String>, latency_ms: i64) -> Self {
        self.error = Some(error.into());
        self.latency_ms = Some(latency_ms);
        self.success = false;
        self
    }
}
