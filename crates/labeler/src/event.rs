//! # Event Source
//!
//! Parses the GitHub Actions trigger (`GITHUB_EVENT_NAME` plus the JSON
//! payload at `GITHUB_EVENT_PATH`) into a typed [`EventDescriptor`] the
//! dispatcher consumes. Only the fields the labeling core needs are
//! deserialized.

use serde::Deserialize;
use thiserror::Error;

/// Which kind of event triggered this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// An issue event (`issues`)
    Issue,
    /// A pull request event (`pull_request` or `pull_request_target`)
    PullRequest,
    /// A manual `workflow_dispatch` run
    WorkflowDispatch,
    /// Anything else; handled as a non-fatal warning
    Unsupported(String),
}

/// Normalized view of the triggering event.
#[derive(Debug, Clone)]
pub struct EventDescriptor {
    pub kind: EventKind,
    /// Issue or PR number to label, when the payload carries one
    pub number: Option<u64>,
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("failed to parse {event} event payload: {source}")]
    Parse {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Issue event payload (simplified)
#[derive(Debug, Deserialize)]
struct IssuesEvent {
    issue: Issue,
}

/// GitHub Issue
#[derive(Debug, Deserialize)]
struct Issue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
}

/// Pull request event payload (simplified)
#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    pull_request: PullRequest,
}

/// GitHub Pull Request
#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
}

/// Parse an event name and its JSON payload into a descriptor.
///
/// Unknown event names produce `EventKind::Unsupported` rather than an error;
/// the dispatcher turns that into a warning and an empty run.
///
/// # Errors
/// Returns `EventError::Parse` when a recognized event's payload does not
/// deserialize.
pub fn parse_event(event_name: &str, payload: &str) -> Result<EventDescriptor, EventError> {
    match event_name {
        "issues" | "issue" => {
            let event: IssuesEvent =
                serde_json::from_str(payload).map_err(|source| EventError::Parse {
                    event: event_name.to_string(),
                    source,
                })?;
            Ok(EventDescriptor {
                kind: EventKind::Issue,
                number: Some(event.issue.number),
                title: Some(event.issue.title),
                body: event.issue.body,
            })
        }
        "pull_request" | "pull_request_target" => {
            let event: PullRequestEvent =
                serde_json::from_str(payload).map_err(|source| EventError::Parse {
                    event: event_name.to_string(),
                    source,
                })?;
            Ok(EventDescriptor {
                kind: EventKind::PullRequest,
                number: Some(event.pull_request.number),
                title: Some(event.pull_request.title),
                body: event.pull_request.body,
            })
        }
        // The dispatch payload carries no issue; number/title/body come from
        // explicit inputs.
        "workflow_dispatch" => Ok(EventDescriptor {
            kind: EventKind::WorkflowDispatch,
            number: None,
            title: None,
            body: None,
        }),
        other => Ok(EventDescriptor {
            kind: EventKind::Unsupported(other.to_string()),
            number: None,
            title: None,
            body: None,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_issue_event() {
        let payload = r#"{
            "action": "opened",
            "issue": {"number": 42, "title": "Fix CI pipeline", "body": "it is broken"}
        }"#;
        let event = parse_event("issues", payload).unwrap();
        assert_eq!(event.kind, EventKind::Issue);
        assert_eq!(event.number, Some(42));
        assert_eq!(event.title.as_deref(), Some("Fix CI pipeline"));
        assert_eq!(event.body.as_deref(), Some("it is broken"));
    }

    #[test]
    fn parses_pull_request_event_with_null_body() {
        let payload = r#"{
            "action": "opened",
            "pull_request": {"number": 7, "title": "Add feature", "body": null}
        }"#;
        let event = parse_event("pull_request", payload).unwrap();
        assert_eq!(event.kind, EventKind::PullRequest);
        assert_eq!(event.number, Some(7));
        assert_eq!(event.body, None);
    }

    #[test]
    fn pull_request_target_is_a_pull_request() {
        let payload = r#"{"pull_request": {"number": 9, "title": "t"}}"#;
        let event = parse_event("pull_request_target", payload).unwrap();
        assert_eq!(event.kind, EventKind::PullRequest);
    }

    #[test]
    fn workflow_dispatch_has_no_payload_fields() {
        let event = parse_event("workflow_dispatch", "{}").unwrap();
        assert_eq!(event.kind, EventKind::WorkflowDispatch);
        assert_eq!(event.number, None);
    }

    #[test]
    fn unknown_event_is_unsupported_not_an_error() {
        let event = parse_event("push", "{}").unwrap();
        assert_eq!(event.kind, EventKind::Unsupported("push".to_string()));
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let err = parse_event("issues", "{\"issue\": {}}").unwrap_err();
        assert!(err.to_string().contains("issues"));
    }
}
