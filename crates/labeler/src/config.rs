//! # Rule Configuration
//!
//! Loads label rules from a YAML or JSON file into a normalized, ordered
//! [`RuleSet`]. The file format is selected by extension; the top level must
//! be a mapping from label name to `{ match: [...], description? }`.
//! Declaration order is preserved because it is the evaluation order.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A single labeling rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Label name, the stable identity used for deduplication
    pub label: String,
    /// Ordered match patterns (substrings or globs), never empty
    pub patterns: Vec<String>,
    /// Optional description used when the label is created
    pub description: Option<String>,
}

/// An ordered set of rules, unique by label name.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set, validating every rule.
    ///
    /// # Errors
    /// Returns `ConfigError` for empty labels, empty pattern lists, empty
    /// patterns, or duplicate label names.
    pub fn new(rules: Vec<Rule>) -> Result<Self, ConfigError> {
        let mut seen: Vec<&str> = Vec::with_capacity(rules.len());
        for rule in &rules {
            if rule.label.trim().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
            if rule.patterns.is_empty() {
                return Err(ConfigError::NoPatterns {
                    label: rule.label.clone(),
                });
            }
            if rule.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::EmptyPattern {
                    label: rule.label.clone(),
                });
            }
            if seen.contains(&rule.label.as_str()) {
                return Err(ConfigError::DuplicateLabel {
                    label: rule.label.clone(),
                });
            }
            seen.push(&rule.label);
        }
        Ok(Self { rules })
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rule value as it appears in the config file.
#[derive(Debug, Deserialize)]
struct RuleSpec {
    /// Match patterns for this label
    #[serde(rename = "match")]
    patterns: Vec<String>,
    /// Optional label description
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported rule file type: {path} (expected .yml, .yaml or .json)")]
    UnsupportedFormat { path: String },

    #[error("failed to parse rule file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("rule file {path} must be a mapping of label name to rule")]
    NotAMapping { path: String },

    #[error("rule file contains an empty label name")]
    EmptyLabel,

    #[error("rule `{label}` has no match patterns")]
    NoPatterns { label: String },

    #[error("rule `{label}` contains an empty match pattern")]
    EmptyPattern { label: String },

    #[error("duplicate rule for label `{label}`")]
    DuplicateLabel { label: String },

    #[error("no {input} configured, required for `{event}` events")]
    MissingRuleSet { event: String, input: String },
}

/// Load a rule set from a YAML or JSON file.
///
/// `$NAME` tokens in the path are substituted from the environment before the
/// file is opened.
///
/// # Errors
/// Returns `ConfigError` if the file cannot be read, has an unsupported
/// extension, fails to parse, or contains invalid rules.
pub fn load_rule_set(path: &str) -> Result<RuleSet, ConfigError> {
    let expanded = expand_env_vars(path);
    let content = std::fs::read_to_string(&expanded).map_err(|source| ConfigError::Io {
        path: expanded.clone(),
        source,
    })?;

    let extension = Path::new(&expanded)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let rules = match extension.as_deref() {
        Some("yml" | "yaml") => parse_yaml(&expanded, &content)?,
        Some("json") => parse_json(&expanded, &content)?,
        _ => {
            return Err(ConfigError::UnsupportedFormat { path: expanded });
        }
    };

    let rule_set = RuleSet::new(rules)?;
    debug!(path = %expanded, rules = rule_set.len(), "Loaded rule set");
    Ok(rule_set)
}

fn parse_yaml(path: &str, content: &str) -> Result<Vec<Rule>, ConfigError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    let serde_yaml::Value::Mapping(mapping) = value else {
        return Err(ConfigError::NotAMapping {
            path: path.to_string(),
        });
    };

    let mut rules = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(label) = key.as_str().map(str::to_string) else {
            return Err(ConfigError::EmptyLabel);
        };
        let spec: RuleSpec = serde_yaml::from_value(value).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: format!("rule `{label}`: {e}"),
        })?;
        rules.push(Rule {
            label,
            patterns: spec.patterns,
            description: spec.description,
        });
    }
    Ok(rules)
}

fn parse_json(path: &str, content: &str) -> Result<Vec<Rule>, ConfigError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    let serde_json::Value::Object(object) = value else {
        return Err(ConfigError::NotAMapping {
            path: path.to_string(),
        });
    };

    let mut rules = Vec::with_capacity(object.len());
    for (label, value) in object {
        let spec: RuleSpec = serde_json::from_value(value).map_err(|e| ConfigError::Parse {
            path: path.to_string(),
            message: format!("rule `{label}`: {e}"),
        })?;
        rules.push(Rule {
            label,
            patterns: spec.patterns,
            description: spec.description,
        });
    }
    Ok(rules)
}

/// Substitute `$NAME` tokens with environment variable values.
///
/// Unset variables leave the token in place so the resulting path error
/// names what was actually tried.
pub fn expand_env_vars(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }
        let rest = &input[i + 1..];
        let name_len = rest
            .char_indices()
            .take_while(|&(j, ch)| ch == '_' || ch.is_ascii_alphabetic() || (j > 0 && ch.is_ascii_digit()))
            .count();
        if name_len == 0 {
            output.push(c);
            continue;
        }
        let name = &rest[..name_len];
        match std::env::var(name) {
            Ok(value) => output.push_str(&value),
            Err(_) => {
                debug!(name, "Environment variable not set, leaving token in place");
                output.push('$');
                output.push_str(name);
            }
        }
        for _ in 0..name_len {
            chars.next();
        }
    }
    output
}
