//! # Dispatcher
//!
//! Drives one labeling run: selects the rule set(s) for the triggering event
//! kind, runs the match engine over the right content, reconciles the matched
//! labels against the repository registry, and applies them in a single call.
//!
//! All per-run state lives in an explicit [`RunContext`] built once per
//! invocation; there are no process-wide singletons.

use crate::config::{ConfigError, RuleSet};
use crate::event::{EventDescriptor, EventKind};
use crate::github::{GitHubError, LabelStore};
use crate::matcher::{self, MatchError, MatchFlags, MatchOutcome, MatchedLabel};
use crate::registry::LabelRegistry;
use thiserror::Error;
use tracing::{info, warn};

/// Name of the fallback label applied when rules were evaluated and none
/// matched, if the fallback is enabled.
pub const FALLBACK_LABEL: &str = "unknown";

/// Per-run configuration knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Apply the `unknown` label when rules were evaluated and none matched
    pub fallback_unknown: bool,
    /// Path-mode glob switches
    pub match_flags: MatchFlags,
}

/// Everything one run needs, constructed once per invocation.
pub struct RunContext<'a> {
    pub store: &'a dyn LabelStore,
    /// Rules matched against issue/PR text
    pub issue_rules: Option<RuleSet>,
    /// Rules matched against PR changed-file paths
    pub path_rules: Option<RuleSet>,
    pub options: RunOptions,
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Labels matched (after dedup), in application order
    pub matched: Vec<String>,
    /// Labels created in the remote registry this run
    pub created: usize,
    /// Labels that already existed
    pub existed: usize,
    /// Labels that could not be ensured (warned, not fatal)
    pub ensure_failures: usize,
    /// Labels actually submitted to the apply call
    pub applied: usize,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("remote call failed: {0}")]
    Remote(#[from] GitHubError),
}

fn require_rules<'a>(
    rules: &'a Option<RuleSet>,
    event: &str,
    input: &str,
) -> Result<&'a RuleSet, ConfigError> {
    rules.as_ref().ok_or_else(|| ConfigError::MissingRuleSet {
        event: event.to_string(),
        input: input.to_string(),
    })
}

/// Run one labeling pass for `event`.
///
/// # Errors
/// Returns `DispatchError` on missing rule sets, malformed patterns, a failed
/// changed-file listing, or a failed label-apply call. Per-label ensure
/// failures are warnings in the summary, not errors.
pub async fn run(
    ctx: &RunContext<'_>,
    event: &EventDescriptor,
) -> Result<RunSummary, DispatchError> {
    match &event.kind {
        EventKind::Unsupported(name) => {
            warn!("Unsupported event kind \"{}\", no labels applied", name);
            Ok(RunSummary::default())
        }
        EventKind::Issue | EventKind::WorkflowDispatch => {
            let event_name = if event.kind == EventKind::Issue {
                "issues"
            } else {
                "workflow_dispatch"
            };
            let rules = require_rules(&ctx.issue_rules, event_name, "issue-config")?;

            let Some(number) = event.number else {
                warn!("No issue or PR number found for this event, nothing to label");
                return Ok(RunSummary::default());
            };

            let outcome = matcher::match_text(
                rules,
                event.title.as_deref().unwrap_or(""),
                event.body.as_deref().unwrap_or(""),
            )?;
            finalize(ctx, number, vec![outcome]).await
        }
        EventKind::PullRequest => {
            let rules = require_rules(&ctx.path_rules, "pull_request", "pr-config")?;

            let Some(number) = event.number else {
                warn!("No issue or PR number found for this event, nothing to label");
                return Ok(RunSummary::default());
            };

            let files = ctx.store.list_changed_files(number).await?;
            let mut outcomes = vec![matcher::match_paths(rules, &files, ctx.options.match_flags)?];

            // Text rules, when configured, also run against the PR title and
            // body so issue-style keywords label PRs too.
            if let Some(issue_rules) = &ctx.issue_rules {
                outcomes.push(matcher::match_text(
                    issue_rules,
                    event.title.as_deref().unwrap_or(""),
                    event.body.as_deref().unwrap_or(""),
                )?);
            }
            finalize(ctx, number, outcomes).await
        }
    }
}

/// Union the match outcomes, ensure the labels exist, apply them.
async fn finalize(
    ctx: &RunContext<'_>,
    number: u64,
    outcomes: Vec<MatchOutcome>,
) -> Result<RunSummary, DispatchError> {
    let mut labels: Vec<MatchedLabel> = Vec::new();
    for outcome in &outcomes {
        for matched in outcome.labels() {
            if !labels.iter().any(|l| l.label == matched.label) {
                labels.push(matched.clone());
            }
        }
    }

    let evaluated_any = outcomes.iter().any(|o| *o != MatchOutcome::NoRules);
    if !evaluated_any {
        warn!("All configured rule sets are empty, nothing to match");
        return Ok(RunSummary::default());
    }

    if labels.is_empty() {
        if ctx.options.fallback_unknown {
            info!("No rule matched, applying fallback label \"{}\"", FALLBACK_LABEL);
            labels.push(MatchedLabel {
                label: FALLBACK_LABEL.to_string(),
                description: None,
            });
        } else {
            info!("No rule matched and no fallback configured, nothing to apply");
            return Ok(RunSummary::default());
        }
    }

    let registry = LabelRegistry::new(ctx.store);
    let report = registry.ensure_all(&labels).await;

    // Best-effort: apply every matched label even when an ensure failed; the
    // remote rejects only what truly cannot be applied.
    let names: Vec<String> = labels.iter().map(|l| l.label.clone()).collect();
    ctx.store.add_labels(number, &names).await?;

    let summary = RunSummary {
        matched: names.clone(),
        created: report.created.len(),
        existed: report.existed.len(),
        ensure_failures: report.failed.len(),
        applied: names.len(),
    };
    info!(
        "Applied {} labels to #{} ({} created, {} existed, {} failed to ensure)",
        summary.applied, number, summary.created, summary.existed, summary.ensure_failures
    );
    Ok(summary)
}
