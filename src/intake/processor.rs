//! Ticket processing: guard, resolve, run, report
//!
//! `TicketProcessor` owns everything one ticket attempt needs. Each attempt
//! may run on its own tokio task; the only state shared between attempts is
//! the processing registry inside the guard.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{error, info, warn};
use serde_json::Value;
use tokio::task::JoinHandle;

use super::comments::{error_comment, final_comment, initial_comment};
use super::eligibility::{EligibilityPolicy, UnmetCriterion};
use super::guard::{IntakeDecision, TicketIntakeGuard};
use super::registry::ProcessingRegistry;
use super::webhook::{WebhookEvent, classify};
use crate::domain::{Objective, RunResult, TicketRecord, ticket_branch_name};
use crate::error::{AidevError, Result};
use crate::jira::TicketSource;
use crate::llm::ModelBackend;
use crate::repo::{RepositoryFactory, RepositoryProxy, with_timeout};
use crate::resolver::{IntakeWorkflow, RepositoryMapping, Resolution};
use crate::runner::{AgentLoop, AgentLoopConfig, DEFAULT_MAX_ITERATIONS};

/// Per-processor settings
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub workflow: IntakeWorkflow,
    pub max_iterations: u32,
    pub agent: AgentLoopConfig,
    /// Base branch for every run; the repository default when unset
    pub base_branch: Option<String>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            workflow: IntakeWorkflow::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            agent: AgentLoopConfig::default(),
            base_branch: None,
        }
    }
}

/// Command-line overrides for one ticket
#[derive(Debug, Clone, Default)]
pub struct TicketOverrides {
    pub repo: Option<String>,
    pub owner: Option<String>,
    pub branch: Option<String>,
}

/// How one ticket attempt ended
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The agent loop ran to a terminal state
    Completed(RunResult),
    Ineligible(Vec<UnmetCriterion>),
    AlreadyInFlight,
    /// No target repository could be derived from the ticket
    Unresolvable,
    /// Webhook event that does not start processing
    Ignored(String),
}

pub struct TicketProcessor {
    guard: TicketIntakeGuard<dyn TicketSource>,
    source: Arc<dyn TicketSource>,
    model: Arc<dyn ModelBackend>,
    repos: Arc<dyn RepositoryFactory>,
    mapping: RepositoryMapping,
    settings: ProcessorSettings,
}

impl TicketProcessor {
    pub fn new(
        source: Arc<dyn TicketSource>,
        model: Arc<dyn ModelBackend>,
        repos: Arc<dyn RepositoryFactory>,
        registry: ProcessingRegistry,
        policy: EligibilityPolicy,
        mapping: RepositoryMapping,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            guard: TicketIntakeGuard::new(source.clone(), registry, policy),
            source,
            model,
            repos,
            mapping,
            settings,
        }
    }

    pub fn registry(&self) -> &ProcessingRegistry {
        self.guard.registry()
    }

    /// Run one ticket from intake to final comment
    pub async fn process(&self, key: &str, overrides: &TicketOverrides) -> Result<ProcessOutcome> {
        let decision = match self.guard.evaluate(key).await {
            Ok(decision) => decision,
            Err(e) => {
                error!("Could not evaluate ticket {}: {}", key, e);
                self.comment(key, &error_comment(&e.to_string())).await;
                return Err(e.into());
            }
        };

        let (ticket, permit) = match decision {
            IntakeDecision::Eligible { ticket, permit } => (ticket, permit),
            IntakeDecision::Ineligible { reasons, .. } => return Ok(ProcessOutcome::Ineligible(reasons)),
            IntakeDecision::AlreadyInFlight => return Ok(ProcessOutcome::AlreadyInFlight),
        };

        let Some(resolution) = self.mapping.resolve_ticket(
            &ticket,
            self.settings.workflow,
            overrides.repo.as_deref(),
            overrides.owner.as_deref(),
        ) else {
            warn!("No target repository for {}", key);
            self.comment(key, &error_comment("no target repository could be resolved for this ticket"))
                .await;
            return Ok(ProcessOutcome::Unresolvable);
        };
        info!("Ticket {} targets {} via {}", key, resolution.target, resolution.rule);

        let result = match self.run_ticket(&ticket, &resolution, overrides).await {
            Ok(result) => result,
            Err(e) => {
                error!("Processing {} failed: {}", key, e);
                self.comment(key, &error_comment(&e.to_string())).await;
                return Err(e);
            }
        };

        self.comment(key, &final_comment(key, &result)).await;
        drop(permit);
        Ok(ProcessOutcome::Completed(result))
    }

    async fn run_ticket(
        &self,
        ticket: &TicketRecord,
        resolution: &Resolution,
        overrides: &TicketOverrides,
    ) -> Result<RunResult> {
        let repo = self.repos.open(&resolution.target)?;
        let base_branch = self.base_branch(repo.as_ref()).await?;
        let branch = overrides
            .branch
            .clone()
            .unwrap_or_else(|| ticket_branch_name(&ticket.key, Utc::now()));

        let objective = Objective::new(ticket.objective_text(), resolution.target.clone(), branch, base_branch);
        self.comment(&ticket.key, &initial_comment(ticket, &objective)).await;

        let mut agent = AgentLoop::with_config(self.model.clone(), repo, self.settings.agent.clone());
        Ok(agent.run(&objective, self.settings.max_iterations).await)
    }

    async fn base_branch(&self, repo: &dyn RepositoryProxy) -> Result<String> {
        match &self.settings.base_branch {
            Some(branch) => Ok(branch.clone()),
            None => Ok(with_timeout(self.settings.agent.call_timeout, repo.default_branch()).await?),
        }
    }

    // Comment failures never change the outcome
    async fn comment(&self, key: &str, text: &str) {
        if let Err(e) = self.source.post_comment(key, text).await {
            warn!("Failed to post comment on {}: {}", key, e);
        }
    }

    /// Process `key` on its own task
    pub fn spawn(self: &Arc<Self>, key: String, overrides: TicketOverrides) -> JoinHandle<Result<ProcessOutcome>> {
        let processor = Arc::clone(self);
        tokio::spawn(async move { processor.process(&key, &overrides).await })
    }

    /// Process every ticket carrying `label` concurrently and wait for all of them
    pub async fn process_label(self: &Arc<Self>, label: &str) -> Result<Vec<(String, Result<ProcessOutcome>)>> {
        let keys = self.source.search_by_label(label).await?;
        info!("Found {} ticket(s) labeled {}", keys.len(), label);

        let handles: Vec<_> = keys
            .iter()
            .map(|key| self.spawn(key.clone(), TicketOverrides::default()))
            .collect();

        let outcomes = join_all(handles).await.into_iter().map(|joined| match joined {
            Ok(outcome) => outcome,
            Err(e) => Err(AidevError::from(e)),
        });
        Ok(keys.into_iter().zip(outcomes).collect())
    }

    /// Classify a webhook body and process the ticket it names
    pub async fn handle_webhook(&self, payload: &Value) -> Result<ProcessOutcome> {
        match classify(payload) {
            WebhookEvent::IssueCreated { key } => {
                info!("Webhook: issue {} created", key);
                self.process(&key, &TicketOverrides::default()).await
            }
            WebhookEvent::Ignored { reason } => {
                info!("Webhook ignored: {}", reason);
                Ok(ProcessOutcome::Ignored(reason))
            }
        }
    }
}
