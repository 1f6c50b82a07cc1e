//! Configuration for aidev
//!
//! Loaded from YAML with a fallback chain. Secrets never live in the file;
//! each section names the environment variable that holds them.

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::intake::{DEFAULT_MAX_STORY_POINTS, EligibilityPolicy, MissingStoryPoints, ProcessorSettings};
use crate::jira::FieldMap;
use crate::llm::{Endpoint, OpenAiConfig};
use crate::repo::GITHUB_API_BASE;
use crate::resolver::{IntakeWorkflow, RepositoryMapping};
use crate::runner::{AgentLoopConfig, DEFAULT_MAX_ITERATIONS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub github: GitHubConfig,
    pub jira: JiraConfig,
    pub agent: AgentConfig,
    pub intake: IntakeConfig,
    pub mapping: RepositoryMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Openai,
    Azure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: String,
    pub azure_endpoint: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Openai,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            azure_endpoint: None,
            azure_deployment: None,
            azure_api_version: "2024-02-15-preview".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 4096,
            timeout_ms: 300000,
        }
    }
}

impl LlmConfig {
    /// Client settings; Azure fields are required only for the Azure provider
    pub fn client_config(&self) -> Result<OpenAiConfig> {
        let endpoint = match self.provider {
            LlmProvider::Openai => Endpoint::OpenAi {
                base_url: self.base_url.clone(),
            },
            LlmProvider::Azure => {
                let Some(endpoint) = self.azure_endpoint.clone() else {
                    bail!("llm.azure_endpoint is required for the azure provider");
                };
                let Some(deployment) = self.azure_deployment.clone() else {
                    bail!("llm.azure_deployment is required for the azure provider");
                };
                Endpoint::Azure {
                    endpoint,
                    deployment,
                    api_version: self.azure_api_version.clone(),
                }
            }
        };

        Ok(OpenAiConfig {
            endpoint,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token_env: String,
    /// Base branch for every run; the repository default when unset
    pub base_branch: Option<String>,
    pub timeout_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            base_branch: None,
            timeout_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Site URL; read from `url_env` when unset
    pub url: Option<String>,
    pub url_env: String,
    pub username_env: String,
    pub token_env: String,
    pub timeout_ms: u64,
    pub fields: FieldMap,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_env: "JIRA_URL".to_string(),
            username_env: "JIRA_USERNAME".to_string(),
            token_env: "JIRA_TOKEN".to_string(),
            timeout_ms: 30000,
            fields: FieldMap::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: u32,
    /// Bound on each model and repository call; none when unset
    pub call_timeout_ms: Option<u64>,
    pub create_pr: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            call_timeout_ms: None,
            create_pr: true,
        }
    }
}

impl AgentConfig {
    pub fn loop_config(&self) -> AgentLoopConfig {
        AgentLoopConfig {
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
            create_pr: self.create_pr,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub workflow: IntakeWorkflow,
    pub max_story_points: f64,
    pub missing_story_points: MissingStoryPoints,
    pub max_iterations: u32,
    /// Label searched by `batch`
    pub label: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            workflow: IntakeWorkflow::Labels,
            max_story_points: DEFAULT_MAX_STORY_POINTS,
            missing_story_points: MissingStoryPoints::Eligible,
            max_iterations: 30,
            label: "UseAI".to_string(),
        }
    }
}

impl IntakeConfig {
    pub fn policy(&self) -> EligibilityPolicy {
        EligibilityPolicy {
            max_story_points: self.max_story_points,
            missing_story_points: self.missing_story_points,
            workflow: self.workflow,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            github: GitHubConfig::default(),
            jira: JiraConfig::default(),
            agent: AgentConfig::default(),
            intake: IntakeConfig::default(),
            mapping: RepositoryMapping::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            bail!("agent.max_iterations must be at least 1");
        }
        if self.intake.max_iterations == 0 {
            bail!("intake.max_iterations must be at least 1");
        }
        if !self.intake.max_story_points.is_finite() || self.intake.max_story_points < 0.0 {
            bail!("intake.max_story_points must be a non-negative number");
        }
        if self.agent.call_timeout_ms == Some(0) {
            bail!("agent.call_timeout_ms must be positive when set");
        }
        if self.mapping.default_repo.trim().is_empty() || self.mapping.default_owner.trim().is_empty() {
            bail!("mapping.default_repo and mapping.default_owner must not be empty");
        }
        Ok(())
    }

    /// Settings for ticket processing; the intake iteration cap replaces the agent one
    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            workflow: self.intake.workflow,
            max_iterations: self.intake.max_iterations,
            agent: self.agent.loop_config(),
            base_branch: self.github.base_branch.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 50);
        assert_eq!(config.intake.max_iterations, 30);
        assert_eq!(config.intake.max_story_points, 5.0);
        assert_eq!(config.intake.workflow, IntakeWorkflow::Labels);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config(
            "intake:\n  workflow: epics\n  missing_story_points: ineligible\nagent:\n  call_timeout_ms: 1500\n",
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.intake.workflow, IntakeWorkflow::Epics);
        assert_eq!(config.intake.missing_story_points, MissingStoryPoints::Ineligible);
        assert_eq!(config.intake.label, "UseAI");
        assert_eq!(config.agent.loop_config().call_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.mapping.default_repo, "Wholesale-Builder");
    }

    #[test]
    fn test_mapping_tables_from_file() {
        let file = write_config(
            "mapping:\n  epics:\n    - epic: Payments\n      repo: payments-api\n  owners:\n    - repo: payments-api\n      owner: acme\n  default_repo: web\n  default_owner: acme\n",
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        let r = config.mapping.resolve_epic(Some("payments"));
        assert_eq!(r.target.to_string(), "acme/payments-api");
    }

    #[test]
    fn test_validation_rejects_zero_iterations() {
        let file = write_config("agent:\n  max_iterations: 0\n");
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_validation_rejects_negative_story_points() {
        let mut config = Config::default();
        config.intake.max_story_points = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = PathBuf::from("/nonexistent/aidev.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let mut llm = LlmConfig {
            provider: LlmProvider::Azure,
            ..Default::default()
        };
        assert!(llm.client_config().is_err());

        llm.azure_endpoint = Some("https://example.openai.azure.com".to_string());
        llm.azure_deployment = Some("gpt-4o".to_string());
        match llm.client_config().unwrap().endpoint {
            Endpoint::Azure { deployment, .. } => assert_eq!(deployment, "gpt-4o"),
            other => panic!("unexpected endpoint {:?}", other),
        }
    }

    #[test]
    fn test_processor_settings() {
        let mut config = Config::default();
        config.github.base_branch = Some("develop".to_string());
        let settings = config.processor_settings();
        assert_eq!(settings.max_iterations, 30);
        assert_eq!(settings.base_branch.as_deref(), Some("develop"));
    }
}
