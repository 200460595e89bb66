//! # Match Engine
//!
//! Evaluates a [`RuleSet`](crate::config::RuleSet) against either issue text
//! (title + body) or a pull request's changed-file list. Evaluation is a pure
//! function: output label order always equals rule declaration order, each
//! label appears at most once, and a rule stops at its first matching pattern.
//!
//! All patterns are compiled before any content is inspected so a malformed
//! glob fails the whole run instead of producing partial results.

use crate::config::RuleSet;
use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::debug;

/// A label produced by the match engine, carrying the rule's description for
/// use when the label has to be created remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedLabel {
    pub label: String,
    pub description: Option<String>,
}

/// Result of one match pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The rule set was empty; nothing could match
    NoRules,
    /// Rules were evaluated and none matched
    NoMatch,
    /// At least one rule matched, in rule declaration order
    Matched(Vec<MatchedLabel>),
}

impl MatchOutcome {
    /// Matched labels, empty for `NoRules` and `NoMatch`.
    pub fn labels(&self) -> &[MatchedLabel] {
        match self {
            Self::Matched(labels) => labels,
            Self::NoRules | Self::NoMatch => &[],
        }
    }
}

/// Switches for path-mode glob matching.
#[derive(Debug, Clone, Copy)]
pub struct MatchFlags {
    /// Respect case when matching paths
    pub case_sensitive: bool,
    /// Require a literal leading `.` in the pattern to match dotfiles
    pub require_literal_dot: bool,
}

impl Default for MatchFlags {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            require_literal_dot: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid pattern `{pattern}` in rule `{label}`: {source}")]
    Pattern {
        label: String,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A rule pattern, pre-classified and pre-compiled.
enum CompiledPattern {
    /// Plain keyword, matched as a lowercase substring of the text
    Substring(String),
    /// Pattern with glob metacharacters; still tried as a substring (so a
    /// literal `?` keyword keeps working) and then against word tokens
    Glob { raw: String, glob: Pattern },
}

struct CompiledRule<'a> {
    label: &'a str,
    description: Option<&'a str>,
    patterns: Vec<CompiledPattern>,
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Compile every text-mode pattern of every rule up front.
///
/// Text matching is case-insensitive, so patterns are lowercased here and the
/// content is lowercased at match time.
fn compile_text_rules(rules: &RuleSet) -> Result<Vec<CompiledRule<'_>>, MatchError> {
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules.rules() {
        let mut patterns = Vec::with_capacity(rule.patterns.len());
        for pattern in &rule.patterns {
            let source = pattern.to_lowercase();
            if has_glob_meta(&source) {
                let glob = Pattern::new(&source).map_err(|source_err| MatchError::Pattern {
                    label: rule.label.clone(),
                    pattern: pattern.clone(),
                    source: source_err,
                })?;
                patterns.push(CompiledPattern::Glob { raw: source, glob });
            } else {
                patterns.push(CompiledPattern::Substring(source));
            }
        }
        compiled.push(CompiledRule {
            label: &rule.label,
            description: rule.description.as_deref(),
            patterns,
        });
    }
    Ok(compiled)
}

/// Match rules against issue/PR text (title + body).
///
/// Plain patterns match as literal substrings of the lowercased text; glob
/// patterns match against individual word tokens (split on non-alphanumeric
/// runs). A rule contributes its label once, at its first matching pattern.
///
/// # Errors
/// Returns `MatchError::Pattern` if any rule contains a malformed glob.
pub fn match_text(rules: &RuleSet, title: &str, body: &str) -> Result<MatchOutcome, MatchError> {
    if rules.is_empty() {
        return Ok(MatchOutcome::NoRules);
    }
    let compiled = compile_text_rules(rules)?;

    let text = format!("{} {}", title.to_lowercase(), body.to_lowercase());
    let tokens: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut matched = Vec::new();
    for rule in &compiled {
        let hit = rule.patterns.iter().any(|pattern| match pattern {
            CompiledPattern::Substring(keyword) => text.contains(keyword.as_str()),
            CompiledPattern::Glob { raw, glob } => {
                text.contains(raw.as_str()) || tokens.iter().any(|token| glob.matches(token))
            }
        });
        if hit {
            debug!(label = rule.label, "Rule matched text");
            matched.push(MatchedLabel {
                label: rule.label.to_string(),
                description: rule.description.map(str::to_string),
            });
        }
    }

    if matched.is_empty() {
        Ok(MatchOutcome::NoMatch)
    } else {
        Ok(MatchOutcome::Matched(matched))
    }
}

/// Match rules against a pull request's changed-file paths.
///
/// Every pattern is treated as a shell glob (`*`, `**`, `?`, character
/// classes); `*` does not cross `/`, `**` does. A rule contributes its label
/// once no matter how many paths or patterns hit.
///
/// # Errors
/// Returns `MatchError::Pattern` if any rule contains a malformed glob.
pub fn match_paths(
    rules: &RuleSet,
    paths: &[String],
    flags: MatchFlags,
) -> Result<MatchOutcome, MatchError> {
    if rules.is_empty() {
        return Ok(MatchOutcome::NoRules);
    }

    // Path mode has no substring form: compile everything as a glob, plain
    // file names included.
    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules.rules() {
        let mut globs = Vec::with_capacity(rule.patterns.len());
        for pattern in &rule.patterns {
            let glob = Pattern::new(pattern).map_err(|source| MatchError::Pattern {
                label: rule.label.clone(),
                pattern: pattern.clone(),
                source,
            })?;
            globs.push(glob);
        }
        compiled.push((rule, globs));
    }

    let options = MatchOptions {
        case_sensitive: flags.case_sensitive,
        require_literal_separator: true,
        require_literal_leading_dot: flags.require_literal_dot,
    };

    let mut matched = Vec::new();
    for (rule, globs) in &compiled {
        let hit = globs
            .iter()
            .any(|glob| paths.iter().any(|path| glob.matches_with(path, options)));
        if hit {
            debug!(label = rule.label, "Rule matched changed files");
            matched.push(MatchedLabel {
                label: rule.label.clone(),
                description: rule.description.clone(),
            });
        }
    }

    if matched.is_empty() {
        Ok(MatchOutcome::NoMatch)
    } else {
        Ok(MatchOutcome::Matched(matched))
    }
}
