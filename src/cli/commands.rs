//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive one objective against one repository
//! - ticket: process a single Jira ticket
//! - batch: process every ticket carrying a label
//! - webhook: dispatch a saved Jira webhook payload
//! - mappings: show the repository tables or test an epic

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aidev - turn an objective or a Jira ticket into a GitHub pull request
#[derive(Parser, Debug)]
#[command(name = "aidev")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Work an objective in one repository and open a pull request
    Run {
        /// Name of the GitHub repository
        repo: String,

        /// What the agent should accomplish
        objective: String,

        /// Repository owner (default: owner table, then the default owner)
        #[arg(long)]
        owner: Option<String>,

        /// Maximum number of model calls
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Working branch (default: ai-assistant-<timestamp>)
        #[arg(short, long)]
        branch: Option<String>,

        /// Skip creating a pull request when finished
        #[arg(long)]
        no_pr: bool,

        /// GitHub token (overrides the environment)
        #[arg(long)]
        github_token: Option<String>,
    },

    /// Process one Jira ticket
    Ticket {
        /// Ticket key, e.g. REP-123
        key: String,

        /// Target repository, bypassing label and epic resolution
        #[arg(short, long)]
        repo: Option<String>,

        /// Repository owner override
        #[arg(long)]
        owner: Option<String>,

        /// Working branch (default: ai-dev-<KEY>-<timestamp>)
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Process every ticket with a label, each on its own task
    Batch {
        /// Label to search for (default: intake.label)
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Dispatch a saved Jira webhook payload
    Webhook {
        /// Path to the JSON payload
        payload: PathBuf,
    },

    /// Show repository mappings, or resolve an epic name
    Mappings {
        /// Epic name to resolve
        #[arg(short, long, conflicts_with = "jira")]
        epic: Option<String>,

        /// Resolve every epic in Jira and flag the unmapped ones
        #[arg(long)]
        jira: bool,
    },
}
