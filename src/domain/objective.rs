//! Objective and repository identity.
//!
//! An Objective is created once per run and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used in generated branch names
const BRANCH_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// An `(owner, repo)` pair on the source-control host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The task driving one agent run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Natural-language task description
    text: String,

    /// Target repository
    repo: RepoRef,

    /// Branch all changes are committed to
    branch: String,

    /// Branch the working branch is cut from and the PR targets
    base_branch: String,
}

impl Objective {
    pub fn new(
        text: impl Into<String>,
        repo: RepoRef,
        branch: impl Into<String>,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            repo,
            branch: branch.into(),
            base_branch: base_branch.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn base_branch(&self) -> &str {
        &self.base_branch
    }

    /// First non-empty line of the objective, used for PR titles
    pub fn headline(&self) -> &str {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }
}

/// Branch name for single-repository mode: `ai-assistant-<UTC timestamp>`
pub fn single_repo_branch_name(now: DateTime<Utc>) -> String {
    format!("ai-assistant-{}", now.format(BRANCH_TIMESTAMP_FORMAT))
}

/// Branch name for ticket mode: `ai-dev-<KEY>-<UTC timestamp>`
pub fn ticket_branch_name(ticket_key: &str, now: DateTime<Utc>) -> String {
    format!("ai-dev-{}-{}", ticket_key, now.format(BRANCH_TIMESTAMP_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 14, 30, 22).unwrap()
    }

    #[test]
    fn test_repo_ref_display() {
        let repo = RepoRef::new("repfitness", "threejs-builder");
        assert_eq!(repo.to_string(), "repfitness/threejs-builder");
    }

    #[test]
    fn test_single_repo_branch_name() {
        assert_eq!(
            single_repo_branch_name(fixed_time()),
            "ai-assistant-20241201-143022"
        );
    }

    #[test]
    fn test_ticket_branch_name() {
        assert_eq!(
            ticket_branch_name("REP-123", fixed_time()),
            "ai-dev-REP-123-20241201-143022"
        );
    }

    #[test]
    fn test_objective_accessors() {
        let objective = Objective::new(
            "Add a README line",
            RepoRef::new("acme", "widgets"),
            "ai-assistant-1",
            "main",
        );
        assert_eq!(objective.text(), "Add a README line");
        assert_eq!(objective.repo().name, "widgets");
        assert_eq!(objective.branch(), "ai-assistant-1");
        assert_eq!(objective.base_branch(), "main");
    }

    #[test]
    fn test_headline_skips_blank_lines() {
        let objective = Objective::new(
            "\n  \nREP-7: Fix login\n\nLonger description",
            RepoRef::new("acme", "widgets"),
            "b",
            "main",
        );
        assert_eq!(objective.headline(), "REP-7: Fix login");
    }
}
