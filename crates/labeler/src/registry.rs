//! # Label Registry Reconciliation
//!
//! Ensures every desired label exists in the remote repository before it is
//! applied. The protocol per label is lookup-then-create: an existing label is
//! a no-op, a missing one is created with a random color, and any other lookup
//! or create failure is recorded without aborting sibling labels.

use crate::github::{GitHubError, LabelLookup, LabelStore};
use crate::matcher::MatchedLabel;
use futures::future::join_all;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What `ensure` did for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The label was already present; no create call was made
    Existed,
    /// The label was created this run
    Created,
}

/// One label that could not be ensured this run.
#[derive(Debug, Error)]
#[error("failed to ensure label `{label}`: {source}")]
pub struct EnsureFailure {
    pub label: String,
    #[source]
    pub source: GitHubError,
}

/// Outcome of a batch ensure. Failures never abort the batch; they are
/// collected here for the caller to report.
#[derive(Debug, Default)]
pub struct EnsureReport {
    /// Labels created this run
    pub created: Vec<String>,
    /// Labels that already existed
    pub existed: Vec<String>,
    /// Labels that could not be ensured
    pub failed: Vec<EnsureFailure>,
}

impl EnsureReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles desired labels against the remote label registry.
pub struct LabelRegistry<'a> {
    store: &'a dyn LabelStore,
}

impl<'a> LabelRegistry<'a> {
    pub fn new(store: &'a dyn LabelStore) -> Self {
        Self { store }
    }

    /// Ensure one label exists, creating it with a random color if missing.
    ///
    /// # Errors
    /// Returns `GitHubError` if the lookup or the create call fails for any
    /// reason other than "not found" (which drives creation) or a create
    /// conflict (which means a concurrent run already satisfied the state).
    pub async fn ensure(
        &self,
        label: &str,
        description: Option<&str>,
    ) -> Result<EnsureOutcome, GitHubError> {
        match self.store.get_label(label).await? {
            LabelLookup::Found(_) => {
                debug!("Label \"{}\" already exists", label);
                Ok(EnsureOutcome::Existed)
            }
            LabelLookup::NotFound => {
                let color = random_color();
                debug!("Label \"{}\" not found, creating it with color #{}", label, color);
                self.store.create_label(label, &color, description).await?;
                info!("Label \"{}\" created with color #{}", label, color);
                Ok(EnsureOutcome::Created)
            }
        }
    }

    /// Ensure a batch of labels concurrently.
    ///
    /// Distinct labels have no ordering dependency, so the lookups and creates
    /// fan out and join. A failing label is logged and recorded in the report;
    /// the others still complete.
    pub async fn ensure_all(&self, labels: &[MatchedLabel]) -> EnsureReport {
        let results = join_all(labels.iter().map(|matched| async move {
            let outcome = self
                .ensure(&matched.label, matched.description.as_deref())
                .await;
            (matched.label.clone(), outcome)
        }))
        .await;

        let mut report = EnsureReport::default();
        for (label, outcome) in results {
            match outcome {
                Ok(EnsureOutcome::Created) => report.created.push(label),
                Ok(EnsureOutcome::Existed) => report.existed.push(label),
                Err(source) => {
                    warn!("Failed to ensure label \"{}\": {}", label, source);
                    report.failed.push(EnsureFailure { label, source });
                }
            }
        }
        report
    }
}

/// A 6-hex-digit color drawn uniformly from `[0-9A-F]^6`. Collisions with
/// existing label colors are acceptable; color is cosmetic only.
fn random_color() -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut rng = rand::thread_rng();
    (0..6).map(|_| HEX[rng.gen_range(0..16)] as char).collect()
}
