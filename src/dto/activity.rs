use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{non_blank, ValidationErrors};
use crate::storage::{Activity, ActivityKind, ParentType};

labelled_enum! {
    /// Task progress.
    pub enum TaskStatus {
        /// Not yet begun.
        NotStarted => "Not Started",
        /// Being worked on.
        InProgress => "In Progress",
        /// Done.
        Completed => "Completed",
        /// Waiting on someone else.
        PendingInput => "Pending Input",
        /// Postponed.
        Deferred => "Deferred",
    }
}

labelled_enum! {
    /// Task urgency.
    pub enum TaskPriority {
        /// Urgent.
        High => "High",
        /// Normal.
        Medium => "Medium",
        /// Whenever there is time.
        Low => "Low",
    }
}

labelled_enum! {
    /// Outcome of a call or meeting.
    pub enum CallStatus {
        /// Scheduled.
        Planned => "Planned",
        /// Took place.
        Held => "Held",
        /// Did not take place.
        NotHeld => "Not Held",
    }
}

labelled_enum! {
    /// Email state.
    pub enum EmailStatus {
        /// Not yet sent.
        Draft => "Draft",
        /// Sent to the recipient.
        Sent => "Sent",
        /// Received from the contact.
        Received => "Received",
        /// Filed away.
        Archived => "Archived",
    }
}

labelled_enum! {
    /// Who initiated a call or email.
    pub enum Direction {
        /// Initiated by the contact.
        Inbound => "Inbound",
        /// Initiated by us.
        Outbound => "Outbound",
    }
}

/// Fields accepted when logging any kind of activity.
///
/// Which of `status`, `priority` and `direction` apply depends on `kind`:
///
/// | kind     | status        | priority     | direction |
/// |----------|---------------|--------------|-----------|
/// | Task     | TaskStatus    | TaskPriority | -         |
/// | Call     | CallStatus    | -            | Direction |
/// | Meeting  | CallStatus    | -            | -         |
/// | Email    | EmailStatus   | -            | Direction |
/// | Note     | -             | -            | -         |
/// | Activity | -             | -            | -         |
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityInput {
    /// Activity kind.
    pub kind: Option<String>,
    /// Short summary.
    pub subject: Option<String>,
    /// Status label, checked against the kind.
    pub status: Option<String>,
    /// Task priority label.
    pub priority: Option<String>,
    /// Call or email direction.
    pub direction: Option<String>,
    /// Length in minutes.
    pub duration_minutes: Option<i64>,
    /// Scheduled start.
    pub starts_at: Option<DateTime<Utc>>,
    /// Scheduled end.
    pub ends_at: Option<DateTime<Utc>>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Kind of record the activity hangs off.
    pub parent_type: Option<String>,
    /// Id of the parent record.
    pub parent_id: Option<String>,
    /// Note or email body.
    pub body: Option<String>,
}

/// An activity input that passed validation. Labels are canonicalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidActivity {
    /// Activity kind.
    pub kind: ActivityKind,
    /// Short summary.
    pub subject: String,
    /// Status label, checked against the kind.
    pub status: Option<String>,
    /// Task priority label.
    pub priority: Option<String>,
    /// Call or email direction.
    pub direction: Option<String>,
    /// Length in minutes.
    pub duration_minutes: Option<i64>,
    /// Scheduled start.
    pub starts_at: Option<DateTime<Utc>>,
    /// Scheduled end.
    pub ends_at: Option<DateTime<Utc>>,
    /// Related contact.
    pub contact_id: Option<String>,
    /// Kind of record the activity hangs off.
    pub parent_type: Option<ParentType>,
    /// Id of the parent record.
    pub parent_id: Option<String>,
    /// Note or email body.
    pub body: Option<String>,
}

fn not_applicable(
    errors: &mut ValidationErrors,
    field: &str,
    value: &Option<String>,
    kind: ActivityKind,
) {
    if non_blank(value.clone()).is_some() {
        errors.add(field, format!("does not apply to {}", kind));
    }
}

impl ActivityInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidActivity, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let kind = match non_blank(self.kind.clone()) {
            Some(raw) => errors.label("kind", Some(&raw), &ActivityKind::labels()),
            None => {
                errors.add("kind", "is required");
                None
            }
        };
        let subject = errors.require("subject", self.subject.clone());

        let (status, priority, direction) = match kind {
            Some(kind) => self.kind_labels(&mut errors, kind),
            None => (None, None, None),
        };

        if let Some(minutes) = self.duration_minutes {
            errors.non_negative("duration_minutes", minutes as f64);
        }
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end < start {
                errors.add("ends_at", "must not be before starts_at");
            }
        }
        if kind == Some(ActivityKind::Meeting) && self.starts_at.is_none() {
            errors.add("starts_at", "is required for meetings");
        }

        let parent_type =
            errors.label("parent_type", self.parent_type.as_deref(), &ParentType::labels());
        let parent_id = non_blank(self.parent_id);
        match (&parent_type, &parent_id) {
            (Some(_), None) => errors.add("parent_id", "is required with parent_type"),
            (None, Some(_)) if non_blank(self.parent_type.clone()).is_none() => {
                errors.add("parent_type", "is required with parent_id")
            }
            _ => {}
        }

        let valid = match (kind, subject) {
            (Some(kind), Some(subject)) => Some(ValidActivity {
                kind,
                subject,
                status,
                priority,
                direction,
                duration_minutes: self.duration_minutes,
                starts_at: self.starts_at,
                ends_at: self.ends_at,
                contact_id: non_blank(self.contact_id),
                parent_type,
                parent_id,
                body: non_blank(self.body),
            }),
            _ => None,
        };
        errors.finish(valid)
    }

    fn kind_labels(
        &self,
        errors: &mut ValidationErrors,
        kind: ActivityKind,
    ) -> (Option<String>, Option<String>, Option<String>) {
        let status = self.status.as_deref();
        let priority = self.priority.as_deref();
        let direction = self.direction.as_deref();

        match kind {
            ActivityKind::Task => {
                not_applicable(errors, "direction", &self.direction, kind);
                let status = errors
                    .label::<TaskStatus>("status", status, &TaskStatus::labels())
                    .unwrap_or(TaskStatus::NotStarted);
                let priority = errors
                    .label::<TaskPriority>("priority", priority, &TaskPriority::labels())
                    .unwrap_or(TaskPriority::Medium);
                (
                    Some(status.as_str().to_string()),
                    Some(priority.as_str().to_string()),
                    None,
                )
            }
            ActivityKind::Call | ActivityKind::Meeting => {
                not_applicable(errors, "priority", &self.priority, kind);
                if kind == ActivityKind::Meeting {
                    not_applicable(errors, "direction", &self.direction, kind);
                }
                let status = errors
                    .label::<CallStatus>("status", status, &CallStatus::labels())
                    .unwrap_or(CallStatus::Planned);
                let direction = if kind == ActivityKind::Call {
                    errors
                        .label::<Direction>("direction", direction, &Direction::labels())
                        .map(|d| d.as_str().to_string())
                } else {
                    None
                };
                (Some(status.as_str().to_string()), None, direction)
            }
            ActivityKind::Email => {
                not_applicable(errors, "priority", &self.priority, kind);
                let status = errors
                    .label::<EmailStatus>("status", status, &EmailStatus::labels())
                    .unwrap_or(EmailStatus::Draft);
                let direction = errors
                    .label::<Direction>("direction", direction, &Direction::labels())
                    .unwrap_or(Direction::Outbound);
                (
                    Some(status.as_str().to_string()),
                    None,
                    Some(direction.as_str().to_string()),
                )
            }
            ActivityKind::Note | ActivityKind::Activity => {
                not_applicable(errors, "status", &self.status, kind);
                not_applicable(errors, "priority", &self.priority, kind);
                not_applicable(errors, "direction", &self.direction, kind);
                (None, None, None)
            }
        }
    }
}

impl ValidActivity {
    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Activity {
        Activity {
            id: Uuid::new_v4().to_string(),
            kind: self.kind,
            subject: self.subject,
            status: self.status,
            priority: self.priority,
            direction: self.direction,
            duration_minutes: self.duration_minutes,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            contact_id: self.contact_id,
            parent_type: self.parent_type,
            parent_id: self.parent_id,
            body: self.body,
            created_at: now,
        }
    }
}
