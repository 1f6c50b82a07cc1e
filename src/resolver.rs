//! Repository resolution for tickets
//!
//! Maps a ticket's label or epic name to an `(owner, repo)` pair through the
//! configured tables. Resolution never fails: unmatched epics fall back to the
//! default repository and unmapped repositories to the default owner.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{RepoRef, TicketRecord};
use crate::jira::{EpicSummary, TicketError, TicketSource};

/// How intake picks the target repository for a ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeWorkflow {
    /// The first ticket label names the repository
    #[default]
    Labels,
    /// The ticket's epic is looked up in the epic table
    Epics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpicMapping {
    pub epic: String,
    pub repo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMapping {
    pub repo: String,
    pub owner: String,
}

/// Which rule produced the repository name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// Repository given explicitly
    Explicit,
    /// First ticket label
    Label,
    /// Epic equal to a table entry, ignoring case
    EpicExact { epic: String },
    /// Epic and a table entry contain one another
    EpicPartial { epic: String },
    /// Nothing matched
    Default,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Explicit => write!(f, "explicit repository"),
            MatchRule::Label => write!(f, "first label"),
            MatchRule::EpicExact { epic } => write!(f, "exact epic match '{}'", epic),
            MatchRule::EpicPartial { epic } => write!(f, "partial epic match '{}'", epic),
            MatchRule::Default => write!(f, "default repository"),
        }
    }
}

/// Resolved target and how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: RepoRef,
    pub rule: MatchRule,
    /// False when the owner came from the default
    pub owner_mapped: bool,
}

/// A tracker epic and the repository it resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicReport {
    pub epic: EpicSummary,
    pub resolution: Resolution,
}

impl EpicReport {
    /// False when the epic fell through to the default repository
    pub fn is_mapped(&self) -> bool {
        self.resolution.rule != MatchRule::Default
    }

    /// Repository name to add to the epic table, for unmapped epics only
    pub fn suggested_repo(&self) -> Option<String> {
        if self.is_mapped() {
            return None;
        }
        let slug = suggest_repo_name(&self.epic.name);
        if slug.is_empty() { None } else { Some(slug) }
    }
}

/// Lowercased epic name with spaces and underscores turned into dashes
pub fn suggest_repo_name(epic: &str) -> String {
    epic.trim().to_lowercase().replace([' ', '_'], "-")
}

/// Epic and owner tables, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryMapping {
    pub epics: Vec<EpicMapping>,
    pub owners: Vec<OwnerMapping>,
    pub default_repo: String,
    pub default_owner: String,
}

impl Default for RepositoryMapping {
    fn default() -> Self {
        let epic = |epic: &str, repo: &str| EpicMapping {
            epic: epic.to_string(),
            repo: repo.to_string(),
        };
        Self {
            epics: vec![
                epic("Builders - Menu Addition", "threejs-builder"),
                epic("Builder - New", "threejs-builder"),
                epic("Builders - Menu Issue", "threejs-builder"),
            ],
            owners: vec![OwnerMapping {
                repo: "threejs-builder".to_string(),
                owner: "repfitness".to_string(),
            }],
            default_repo: "Wholesale-Builder".to_string(),
            default_owner: "AJFrio".to_string(),
        }
    }
}

impl RepositoryMapping {
    /// Repository name for an epic, with the rule that matched
    pub fn repo_for_epic(&self, epic: Option<&str>) -> (String, MatchRule) {
        let epic = epic.map(str::trim).unwrap_or_default();
        if epic.is_empty() {
            return (self.default_repo.clone(), MatchRule::Default);
        }
        let wanted = epic.to_lowercase();

        if let Some(m) = self.epics.iter().find(|m| m.epic.trim().to_lowercase() == wanted) {
            return (
                m.repo.clone(),
                MatchRule::EpicExact {
                    epic: m.epic.clone(),
                },
            );
        }

        let partial = self.epics.iter().find(|m| {
            let key = m.epic.trim().to_lowercase();
            !key.is_empty() && (key.contains(&wanted) || wanted.contains(&key))
        });
        if let Some(m) = partial {
            return (
                m.repo.clone(),
                MatchRule::EpicPartial {
                    epic: m.epic.clone(),
                },
            );
        }

        (self.default_repo.clone(), MatchRule::Default)
    }

    /// Owner for a repository name, `None` when unmapped
    pub fn mapped_owner(&self, repo: &str) -> Option<&str> {
        let wanted = repo.trim().to_lowercase();
        self.owners
            .iter()
            .find(|m| m.repo.trim().to_lowercase() == wanted)
            .map(|m| m.owner.as_str())
    }

    /// Owner for a repository name, falling back to the default owner
    pub fn owner_for(&self, repo: &str) -> &str {
        self.mapped_owner(repo).unwrap_or(&self.default_owner)
    }

    fn finish(&self, repo: String, rule: MatchRule, owner: Option<&str>) -> Resolution {
        let (owner, owner_mapped) = match owner {
            Some(owner) => (owner.to_string(), true),
            None => match self.mapped_owner(&repo) {
                Some(owner) => (owner.to_string(), true),
                None => (self.default_owner.clone(), false),
            },
        };
        Resolution {
            target: RepoRef::new(owner, repo),
            rule,
            owner_mapped,
        }
    }

    /// Single-repository mode: the repository is given, only the owner is looked up
    pub fn resolve_explicit(&self, repo: &str, owner: Option<&str>) -> Resolution {
        self.finish(repo.trim().to_string(), MatchRule::Explicit, owner)
    }

    /// Resolution through the epic table
    pub fn resolve_epic(&self, epic: Option<&str>) -> Resolution {
        let (repo, rule) = self.repo_for_epic(epic);
        self.finish(repo, rule, None)
    }

    /// Resolve a ticket under `workflow`
    ///
    /// An explicit repository bypasses the tables. In the label workflow a
    /// ticket without labels has no target.
    pub fn resolve_ticket(
        &self,
        ticket: &TicketRecord,
        workflow: IntakeWorkflow,
        explicit_repo: Option<&str>,
        explicit_owner: Option<&str>,
    ) -> Option<Resolution> {
        if let Some(repo) = explicit_repo {
            return Some(self.resolve_explicit(repo, explicit_owner));
        }

        let mut resolution = match workflow {
            IntakeWorkflow::Labels => {
                let label = ticket.labels.iter().map(|l| l.trim()).find(|l| !l.is_empty())?;
                self.finish(label.to_string(), MatchRule::Label, None)
            }
            IntakeWorkflow::Epics => self.resolve_epic(ticket.epic_name.as_deref()),
        };

        if let Some(owner) = explicit_owner {
            resolution.target.owner = owner.to_string();
            resolution.owner_mapped = true;
        }
        Some(resolution)
    }

    /// Resolve every listed epic, in listing order
    pub fn report(&self, epics: Vec<EpicSummary>) -> Vec<EpicReport> {
        epics
            .into_iter()
            .map(|epic| {
                let resolution = self.resolve_epic(Some(&epic.name));
                EpicReport { epic, resolution }
            })
            .collect()
    }

    /// Fetch the tracker's epics and resolve each one
    pub async fn report_epics<S: TicketSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Vec<EpicReport>, TicketError> {
        let epics = source.list_epics().await?;
        Ok(self.report(epics))
    }
}
