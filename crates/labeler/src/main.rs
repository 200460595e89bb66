//! Auto-labeler CLI - labels issues and PRs from a user-supplied rule set.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use labeler::config;
use labeler::dispatcher::{self, RunContext, RunOptions};
use labeler::event;
use labeler::matcher::MatchFlags;
use labeler::GitHubClient;

/// Label issues and pull requests by matching configured rules against their
/// text or changed files.
#[derive(Parser)]
#[command(name = "labeler")]
#[command(about = "Rule-based issue and PR auto-labeler")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: String,

    /// Repository in owner/repo form (defaults to the Actions environment)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,

    /// Repository owner, overrides the owner half of --repository
    #[arg(long)]
    owner: Option<String>,

    /// Repository name, overrides the repo half of --repository
    #[arg(long)]
    repo: Option<String>,

    /// Triggering event name
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: String,

    /// Path to the event payload JSON
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Rule file for issue-style text matching ($NAME tokens are expanded)
    #[arg(long, env = "INPUT_ISSUE_CONFIG")]
    issue_config: Option<String>,

    /// Rule file for PR changed-file matching ($NAME tokens are expanded)
    #[arg(long, env = "INPUT_PR_CONFIG")]
    pr_config: Option<String>,

    /// Apply the `unknown` label when no rule matches
    #[arg(long, env = "INPUT_FALLBACK_UNKNOWN")]
    fallback_unknown: bool,

    /// Match changed-file paths case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// Require globs to spell out a leading dot to match dotfiles
    #[arg(long)]
    require_literal_dot: bool,

    /// Issue or PR number to label (required for workflow_dispatch)
    #[arg(long)]
    issue_number: Option<u64>,

    /// Title text override (workflow_dispatch)
    #[arg(long)]
    title: Option<String>,

    /// Body text override (workflow_dispatch)
    #[arg(long)]
    body: Option<String>,

    /// GitHub API base URL (GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,
}

impl Cli {
    /// Resolve owner and repo from the explicit flags or `owner/repo`.
    fn resolve_repo(&self) -> Result<(String, String)> {
        let (env_owner, env_repo) = match self.repository.as_deref() {
            Some(full) => match full.split_once('/') {
                Some((owner, repo)) => (Some(owner.to_string()), Some(repo.to_string())),
                None => bail!("--repository must be in owner/repo form, got `{full}`"),
            },
            None => (None, None),
        };

        let owner = self
            .owner
            .clone()
            .or(env_owner)
            .context("no repository owner configured (--owner or GITHUB_REPOSITORY)")?;
        let repo = self
            .repo
            .clone()
            .or(env_repo)
            .context("no repository name configured (--repo or GITHUB_REPOSITORY)")?;
        Ok((owner, repo))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("labeler=debug,info")
    } else {
        EnvFilter::new("labeler=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let (owner, repo) = cli.resolve_repo()?;
    tracing::info!(owner, repo, event = cli.event_name, "Starting labeling run");

    let issue_rules = cli
        .issue_config
        .as_deref()
        .map(config::load_rule_set)
        .transpose()?;
    let path_rules = cli
        .pr_config
        .as_deref()
        .map(config::load_rule_set)
        .transpose()?;

    let payload = match &cli.event_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event payload {}", path.display()))?,
        None => "{}".to_string(),
    };
    let mut event = event::parse_event(&cli.event_name, &payload)?;

    // Explicit inputs take precedence over the payload, and are the only
    // source of a target for workflow_dispatch runs.
    if cli.issue_number.is_some() {
        event.number = cli.issue_number;
    }
    if cli.title.is_some() {
        event.title = cli.title.clone();
    }
    if cli.body.is_some() {
        event.body = cli.body.clone();
    }

    let store = match &cli.api_url {
        Some(url) => GitHubClient::with_base_url(url.clone(), cli.github_token.clone(), owner, repo)?,
        None => GitHubClient::new(cli.github_token.clone(), owner, repo)?,
    };

    let ctx = RunContext {
        store: &store,
        issue_rules,
        path_rules,
        options: RunOptions {
            fallback_unknown: cli.fallback_unknown,
            match_flags: MatchFlags {
                case_sensitive: !cli.ignore_case,
                require_literal_dot: cli.require_literal_dot,
            },
        },
    };

    let summary = dispatcher::run(&ctx, &event).await?;
    tracing::info!(
        matched = summary.matched.len(),
        created = summary.created,
        applied = summary.applied,
        ensure_failures = summary.ensure_failures,
        "Labeling run finished"
    );
    Ok(())
}
