use chrono::Utc;
use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail, eyre};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aidev::config::Config;
use aidev::domain::{Objective, RunResult, RunState, single_repo_branch_name};
use aidev::intake::{ProcessOutcome, ProcessingRegistry, TicketOverrides, TicketProcessor};
use aidev::jira::{JiraClient, TicketSource};
use aidev::llm::{ChatModelBackend, ModelBackend, OpenAiClient};
use aidev::repo::{GitHubRepositoryFactory, RepositoryFactory, with_timeout};
use aidev::runner::{AgentLoop, AgentLoopConfig};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(level: &str) -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aidev")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("aidev.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| eyre!("{} is not set", name))
}

fn build_model(config: &Config) -> Result<Arc<dyn ModelBackend>> {
    let client = OpenAiClient::from_env(&config.llm.api_key_env, config.llm.client_config()?)
        .context("Failed to create LLM client")?;
    let backend = ChatModelBackend::new(Arc::new(client)).with_max_tokens(config.llm.max_tokens);
    Ok(Arc::new(backend))
}

fn build_repositories(config: &Config, token: Option<&str>) -> Result<Arc<dyn RepositoryFactory>> {
    let token = match token {
        Some(token) => token.to_string(),
        None => env_var(&config.github.token_env).context("A GitHub token is required")?,
    };
    Ok(Arc::new(GitHubRepositoryFactory::new(
        config.github.api_base.clone(),
        token,
        Duration::from_millis(config.github.timeout_ms),
    )))
}

fn build_ticket_source(config: &Config) -> Result<Arc<dyn TicketSource>> {
    let jira = &config.jira;
    let url = match &jira.url {
        Some(url) => url.clone(),
        None => env_var(&jira.url_env)?,
    };
    let client = JiraClient::new(
        url,
        env_var(&jira.username_env)?,
        env_var(&jira.token_env)?,
        jira.fields.clone(),
        Duration::from_millis(jira.timeout_ms),
    )
    .context("Failed to create Jira client")?;
    Ok(Arc::new(client))
}

fn build_processor(config: &Config) -> Result<TicketProcessor> {
    Ok(TicketProcessor::new(
        build_ticket_source(config)?,
        build_model(config)?,
        build_repositories(config, None)?,
        ProcessingRegistry::new(),
        config.intake.policy(),
        config.mapping.clone(),
        config.processor_settings(),
    ))
}

fn print_result(result: &RunResult, verbose: bool) {
    if result.success {
        println!("\n{}", "✅ SUCCESS!".green().bold());
        println!("Task completed in {} iterations", result.iterations);
    } else {
        println!("\n{}", "❌ FAILED!".red().bold());
        println!("{} {}", "Outcome:".red(), RunState::from(result.outcome));
    }
    println!("Branch: {}", result.branch);
    if let Some(url) = &result.pull_request_url {
        println!("Pull Request: {}", url.cyan());
    }
    if !result.files_modified.is_empty() {
        println!("Files modified: {}", result.files_list().join(", "));
    }
    if verbose || !result.success {
        println!("\n{}\n{}", "Summary:".bold(), result.summary);
    }
}

fn print_outcome(key: &str, outcome: &ProcessOutcome, verbose: bool) {
    match outcome {
        ProcessOutcome::Completed(result) => {
            println!("{} {}", "Ticket:".green(), key);
            print_result(result, verbose);
        }
        ProcessOutcome::Ineligible(reasons) => {
            println!("{} {} is not eligible", "Skipped:".yellow(), key);
            for reason in reasons {
                println!("  - {}", reason);
            }
        }
        ProcessOutcome::AlreadyInFlight => println!("{} {} is already being processed", "Skipped:".yellow(), key),
        ProcessOutcome::Unresolvable => println!("{} no repository could be resolved for {}", "Skipped:".yellow(), key),
        ProcessOutcome::Ignored(reason) => println!("{} {}", "Ignored:".yellow(), reason),
    }
}

struct RunArgs {
    repo: String,
    objective: String,
    owner: Option<String>,
    max_iterations: Option<u32>,
    branch: Option<String>,
    no_pr: bool,
    github_token: Option<String>,
}

async fn handle_run_command(args: RunArgs, config: &Config, verbose: bool) -> Result<bool> {
    let max_iterations = args.max_iterations.unwrap_or(config.agent.max_iterations);
    if max_iterations == 0 {
        bail!("--max-iterations must be at least 1");
    }

    let model = build_model(config)?;
    let repos = build_repositories(config, args.github_token.as_deref())?;
    let resolution = config.mapping.resolve_explicit(&args.repo, args.owner.as_deref());
    let repo = repos.open(&resolution.target)?;

    let loop_config = AgentLoopConfig {
        create_pr: config.agent.create_pr && !args.no_pr,
        ..config.agent.loop_config()
    };
    let base_branch = match &config.github.base_branch {
        Some(branch) => branch.clone(),
        None => with_timeout(loop_config.call_timeout, repo.default_branch())
            .await
            .context("Failed to look up the default branch")?,
    };
    let branch = args.branch.unwrap_or_else(|| single_repo_branch_name(Utc::now()));
    let objective = Objective::new(args.objective, resolution.target.clone(), branch, base_branch);

    println!("{}", "🤖 AI Dev".bold());
    println!("{}", "=".repeat(50));
    println!("Repository: {}", objective.repo());
    println!("Objective: {}", objective.headline());
    println!("Branch: {} (from {})", objective.branch(), objective.base_branch());
    println!("Max Iterations: {}", max_iterations);
    println!("Create PR: {}", if loop_config.create_pr { "Yes" } else { "No" });
    println!("{}", "=".repeat(50));

    let mut agent = AgentLoop::with_config(model, repo, loop_config);
    let result = agent.run(&objective, max_iterations).await;
    print_result(&result, verbose);
    Ok(result.success)
}

async fn handle_ticket_command(key: &str, overrides: TicketOverrides, config: &Config, verbose: bool) -> Result<bool> {
    let processor = build_processor(config)?;
    let outcome = processor
        .process(key, &overrides)
        .await
        .context(format!("Failed to process {}", key))?;
    print_outcome(key, &outcome, verbose);
    Ok(!matches!(&outcome, ProcessOutcome::Completed(result) if !result.success))
}

async fn handle_batch_command(label: Option<String>, config: &Config, verbose: bool) -> Result<bool> {
    let label = label.unwrap_or_else(|| config.intake.label.clone());
    let processor = Arc::new(build_processor(config)?);

    println!("{} tickets labeled {}", "Processing".cyan(), label);
    let outcomes = processor.process_label(&label).await?;
    if outcomes.is_empty() {
        println!("No tickets found");
    }

    let mut all_ok = true;
    for (key, outcome) in &outcomes {
        match outcome {
            Ok(outcome) => {
                if matches!(outcome, ProcessOutcome::Completed(result) if !result.success) {
                    all_ok = false;
                }
                print_outcome(key, outcome, verbose);
            }
            Err(e) => {
                all_ok = false;
                println!("{} {}: {}", "Error:".red(), key, e);
            }
        }
    }
    Ok(all_ok)
}

async fn handle_webhook_command(payload: &Path, config: &Config, verbose: bool) -> Result<bool> {
    let body = fs::read_to_string(payload).context(format!("Failed to read {}", payload.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&body).context("Payload is not valid JSON")?;

    let processor = build_processor(config)?;
    let outcome = processor.handle_webhook(&payload).await?;
    let key = payload["issue"]["key"].as_str().unwrap_or("webhook");
    print_outcome(key, &outcome, verbose);
    Ok(!matches!(&outcome, ProcessOutcome::Completed(result) if !result.success))
}

async fn handle_jira_epics(config: &Config) -> Result<bool> {
    let source = build_ticket_source(config)?;
    let report = config
        .mapping
        .report_epics(source.as_ref())
        .await
        .context("Failed to list Jira epics")?;

    if report.is_empty() {
        println!("No epics found in Jira");
        return Ok(true);
    }

    println!("{} {} epics", "Found".green(), report.len());
    for (i, entry) in report.iter().enumerate() {
        let status = if entry.is_mapped() {
            "mapped".green()
        } else {
            "unmapped, using default".yellow()
        };
        println!("{:2}. {} - {} [{}]", i + 1, entry.epic.key, entry.epic.name, status);
        if let Some(state) = &entry.epic.status {
            println!("    Status: {}", state);
        }
        println!("    Repository: {}", entry.resolution.target);
        println!("    Matched by: {}", entry.resolution.rule);
    }

    let suggestions: Vec<(String, String)> = report
        .iter()
        .filter_map(|entry| entry.suggested_repo().map(|repo| (entry.epic.name.clone(), repo)))
        .collect();
    if !suggestions.is_empty() {
        println!("\n{}", "Suggested epic mappings".bold());
        for (epic, repo) in suggestions {
            println!("  - epic: \"{}\"\n    repo: {}", epic, repo);
        }
    }
    Ok(true)
}

async fn handle_mappings_command(epic: Option<&str>, jira: bool, config: &Config) -> Result<bool> {
    if jira {
        return handle_jira_epics(config).await;
    }

    let mapping = &config.mapping;

    if let Some(epic) = epic {
        let resolution = mapping.resolve_epic(Some(epic));
        println!("{} {}", "Epic:".green(), epic);
        println!("  Repository: {}", resolution.target);
        println!("  Matched by: {}", resolution.rule);
        if !resolution.owner_mapped {
            println!("  Owner: {} (default)", resolution.target.owner);
        }
        return Ok(true);
    }

    println!("{}", "Epic → repository".bold());
    for entry in &mapping.epics {
        println!("  {} → {}", entry.epic, entry.repo);
    }
    println!("{}", "Repository → owner".bold());
    for entry in &mapping.owners {
        println!("  {} → {}", entry.repo, entry.owner);
    }
    println!("Default repository: {}", mapping.default_repo);
    println!("Default owner: {}", mapping.default_owner);
    Ok(true)
}

async fn run_application(cli: Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    let verbose = cli.is_verbose();
    if verbose {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        Commands::Run {
            repo,
            objective,
            owner,
            max_iterations,
            branch,
            no_pr,
            github_token,
        } => {
            let args = RunArgs {
                repo,
                objective,
                owner,
                max_iterations,
                branch,
                no_pr,
                github_token,
            };
            handle_run_command(args, config, verbose).await
        }
        Commands::Ticket { key, repo, owner, branch } => {
            let overrides = TicketOverrides { repo, owner, branch };
            handle_ticket_command(&key, overrides, config, verbose).await
        }
        Commands::Batch { label } => handle_batch_command(label, config, verbose).await,
        Commands::Webhook { payload } => handle_webhook_command(&payload, config, verbose).await,
        Commands::Mappings { epic, jira } => handle_mappings_command(epic.as_deref(), jira, config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may come from a .env file; a missing file is fine
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    let level = if cli.is_verbose() {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    setup_logging(level).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let succeeded = run_application(cli, &config).await.context("Application failed")?;
    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
