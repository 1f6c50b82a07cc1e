//! Ticket intake
//!
//! Turns tracker events into agent runs:
//! - ProcessingRegistry: which ticket keys are in flight
//! - EligibilityPolicy: whether a ticket may be automated
//! - TicketIntakeGuard: claim, fetch fresh, check
//! - TicketProcessor: resolve the repository, run, comment

pub mod comments;
pub mod eligibility;
pub mod guard;
pub mod processor;
pub mod registry;
pub mod webhook;

pub use eligibility::{DEFAULT_MAX_STORY_POINTS, EligibilityPolicy, MissingStoryPoints, UnmetCriterion};
pub use guard::{IntakeDecision, TicketIntakeGuard};
pub use processor::{ProcessOutcome, ProcessorSettings, TicketOverrides, TicketProcessor};
pub use registry::{InFlightPermit, ProcessingRegistry};
pub use webhook::{WebhookEvent, classify};
