//! Rule-based auto-labeler for GitHub issues and pull requests.
//!
//! This crate provides:
//! - Rule-file loading (YAML or JSON) into an ordered, validated rule set
//! - Text and changed-file matching with shell-glob pattern support
//! - Idempotent label reconciliation against the repository label registry
//! - A dispatcher that selects rule sets by event kind and applies the result

pub mod config;
pub mod dispatcher;
pub mod event;
pub mod github;
pub mod matcher;
pub mod registry;

// Re-export main types
pub use config::{Rule, RuleSet};
pub use dispatcher::{RunContext, RunOptions, RunSummary};
pub use event::{EventDescriptor, EventKind};
pub use github::{GitHubClient, LabelLookup, LabelRecord, LabelStore};
pub use matcher::{MatchFlags, MatchOutcome, MatchedLabel};
pub use registry::{EnsureOutcome, EnsureReport, LabelRegistry};
