//! Record services.
//!
//! Each service validates input through [`crate::dto`], writes through
//! [`crate::storage`] and logs the outcome. Every operation takes `now`
//! from the caller.

mod activities;
mod cases;
mod contacts;
mod core;
mod health;
mod leads;
mod opportunities;

pub use activities::ActivityService;
pub use cases::CaseService;
pub use contacts::{ContactService, ContactWrite};
pub use core::ServiceCore;
pub use health::{HealthService, RecalcFailure, RecalcSummary, DEFAULT_HISTORY_LIMIT};
pub use leads::LeadService;
pub use opportunities::OpportunityService;
