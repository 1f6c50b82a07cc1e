//! Ticket intake guard
//!
//! Claims the ticket key first, then fetches the ticket fresh and checks it
//! against the eligibility policy. Only an `Eligible` decision keeps the key
//! claimed; every other path releases it before returning.

use std::sync::Arc;

use log::{info, warn};

use super::comments::ineligible_comment;
use super::eligibility::{EligibilityPolicy, UnmetCriterion};
use super::registry::{InFlightPermit, ProcessingRegistry};
use crate::domain::TicketRecord;
use crate::jira::{TicketError, TicketSource};

/// Outcome of evaluating one ticket event
#[derive(Debug)]
pub enum IntakeDecision {
    /// Ready to run; the key stays claimed until `permit` drops
    Eligible {
        ticket: TicketRecord,
        permit: InFlightPermit,
    },
    /// Failed one or more criteria; a comment has been posted
    Ineligible {
        ticket: TicketRecord,
        reasons: Vec<UnmetCriterion>,
    },
    /// Another attempt owns this key
    AlreadyInFlight,
}

impl IntakeDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, IntakeDecision::Eligible { .. })
    }
}

pub struct TicketIntakeGuard<S: TicketSource + ?Sized> {
    source: Arc<S>,
    registry: ProcessingRegistry,
    policy: EligibilityPolicy,
}

impl<S: TicketSource + ?Sized> TicketIntakeGuard<S> {
    pub fn new(source: Arc<S>, registry: ProcessingRegistry, policy: EligibilityPolicy) -> Self {
        Self {
            source,
            registry,
            policy,
        }
    }

    pub fn registry(&self) -> &ProcessingRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Decide whether the ticket behind `key` may start a run
    pub async fn evaluate(&self, key: &str) -> Result<IntakeDecision, TicketError> {
        let Some(permit) = self.registry.try_acquire(key) else {
            info!("Ticket {} is already being processed, dropping event", key);
            return Ok(IntakeDecision::AlreadyInFlight);
        };

        // A fetch error drops the permit on the way out
        let ticket = self.source.get_ticket(key).await?;

        let reasons = self.policy.unmet(&ticket);
        if reasons.is_empty() {
            info!("Ticket {} is eligible", key);
            return Ok(IntakeDecision::Eligible { ticket, permit });
        }

        drop(permit);
        info!("Ticket {} is not eligible: {} unmet criteria", key, reasons.len());
        if let Err(e) = self.source.post_comment(key, &ineligible_comment(&reasons)).await {
            warn!("Failed to post ineligible comment on {}: {}", key, e);
        }
        Ok(IntakeDecision::Ineligible { ticket, reasons })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jira::MemoryTicketSource;

    fn eligible_ticket(key: &str) -> TicketRecord {
        TicketRecord::new(key)
            .with_summary("Fix the header")
            .with_description("The header overlaps the menu")
            .with_labels(["threejs-builder"])
            .with_story_points(3.0)
    }

    fn guard(source: Arc<MemoryTicketSource>) -> TicketIntakeGuard<MemoryTicketSource> {
        TicketIntakeGuard::new(source, ProcessingRegistry::new(), EligibilityPolicy::default())
    }

    #[tokio::test]
    async fn test_eligible_holds_key() {
        let source = Arc::new(MemoryTicketSource::new().with_ticket(eligible_ticket("REP-1")));
        let guard = guard(source.clone());

        let decision = guard.evaluate("REP-1").await.unwrap();
        assert!(decision.is_eligible());
        assert!(guard.registry().contains("REP-1"));
        assert!(source.comments().is_empty());

        drop(decision);
        assert!(guard.registry().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_event_dropped_without_comment() {
        let source = Arc::new(MemoryTicketSource::new().with_ticket(eligible_ticket("REP-1")));
        let guard = guard(source.clone());

        let first = guard.evaluate("REP-1").await.unwrap();
        let second = guard.evaluate("REP-1").await.unwrap();
        assert!(first.is_eligible());
        assert!(matches!(second, IntakeDecision::AlreadyInFlight));
        assert_eq!(source.fetch_count(), 1);
        assert!(source.comments().is_empty());
    }

    #[tokio::test]
    async fn test_ineligible_comments_once_and_releases() {
        let ticket = eligible_ticket("REP-2").with_story_points(8.0);
        let source = Arc::new(MemoryTicketSource::new().with_ticket(ticket));
        let guard = guard(source.clone());

        match guard.evaluate("REP-2").await.unwrap() {
            IntakeDecision::Ineligible { reasons, .. } => {
                assert_eq!(reasons, vec![UnmetCriterion::TooManyStoryPoints { points: 8.0, max: 5.0 }]);
            }
            other => panic!("expected Ineligible, got {:?}", other),
        }
        assert!(guard.registry().is_empty());

        let comments = source.comments_for("REP-2");
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("exceed the maximum"));
    }

    #[tokio::test]
    async fn test_fetch_error_releases_key() {
        let source = Arc::new(MemoryTicketSource::new());
        let guard = guard(source);

        let err = guard.evaluate("REP-404").await.unwrap_err();
        assert!(matches!(err, TicketError::NotFound(_)));
        assert!(guard.registry().is_empty());
    }

    #[tokio::test]
    async fn test_ticket_fetched_fresh_each_time() {
        let source = Arc::new(MemoryTicketSource::new().with_ticket(eligible_ticket("REP-3").with_description("")));
        let guard = guard(source.clone());

        assert!(matches!(
            guard.evaluate("REP-3").await.unwrap(),
            IntakeDecision::Ineligible { .. }
        ));

        source.put(eligible_ticket("REP-3"));
        assert!(guard.evaluate("REP-3").await.unwrap().is_eligible());
        assert_eq!(source.fetch_count(), 2);
    }
}
