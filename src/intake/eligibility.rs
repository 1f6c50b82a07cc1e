//! Ticket eligibility for automated processing

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::TicketRecord;
use crate::resolver::IntakeWorkflow;

/// Default story-point ceiling, inclusive
pub const DEFAULT_MAX_STORY_POINTS: f64 = 5.0;

/// What to do with a ticket that has no story points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingStoryPoints {
    #[default]
    Eligible,
    Ineligible,
}

/// A criterion a ticket failed
#[derive(Debug, Clone, PartialEq)]
pub enum UnmetCriterion {
    TooManyStoryPoints { points: f64, max: f64 },
    MissingStoryPoints,
    MissingDescription,
    MissingLabel,
    MissingEpic,
}

impl fmt::Display for UnmetCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmetCriterion::TooManyStoryPoints { points, max } => {
                write!(f, "story points {} exceed the maximum of {}", points, max)
            }
            UnmetCriterion::MissingStoryPoints => write!(f, "story points are not set"),
            UnmetCriterion::MissingDescription => write!(f, "description is empty"),
            UnmetCriterion::MissingLabel => write!(f, "no label naming the target repository"),
            UnmetCriterion::MissingEpic => write!(f, "no epic linked to select the target repository"),
        }
    }
}

/// Criteria a ticket must meet before a run is started
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityPolicy {
    pub max_story_points: f64,
    pub missing_story_points: MissingStoryPoints,
    pub workflow: IntakeWorkflow,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            max_story_points: DEFAULT_MAX_STORY_POINTS,
            missing_story_points: MissingStoryPoints::default(),
            workflow: IntakeWorkflow::default(),
        }
    }
}

impl EligibilityPolicy {
    /// Every criterion `ticket` fails; empty means eligible
    pub fn unmet(&self, ticket: &TicketRecord) -> Vec<UnmetCriterion> {
        let mut unmet = Vec::new();

        match ticket.story_points {
            Some(points) if points > self.max_story_points => unmet.push(UnmetCriterion::TooManyStoryPoints {
                points,
                max: self.max_story_points,
            }),
            None if self.missing_story_points == MissingStoryPoints::Ineligible => {
                unmet.push(UnmetCriterion::MissingStoryPoints)
            }
            _ => {}
        }

        if !ticket.has_description() {
            unmet.push(UnmetCriterion::MissingDescription);
        }

        match self.workflow {
            IntakeWorkflow::Labels if !ticket.labels.iter().any(|l| !l.trim().is_empty()) => {
                unmet.push(UnmetCriterion::MissingLabel)
            }
            IntakeWorkflow::Epics if !ticket.has_epic() => unmet.push(UnmetCriterion::MissingEpic),
            _ => {}
        }

        unmet
    }

    pub fn is_eligible(&self, ticket: &TicketRecord) -> bool {
        self.unmet(ticket).is_empty()
    }
}
