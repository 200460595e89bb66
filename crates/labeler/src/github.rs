//! # GitHub Label Store
//!
//! Narrow capability interface over the GitHub REST API: label lookup, label
//! creation, label assignment, and the paged changed-file listing for a pull
//! request. The core only ever sees the [`LabelStore`] trait; [`GitHubClient`]
//! is the reqwest adapter with rate-limit detection.

use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Files per page for the pull request file listing.
const FILES_PER_PAGE: usize = 100;

/// A label as stored in the remote repository.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LabelRecord {
    /// Label name
    pub name: String,
    /// 6-hex-digit color, no leading `#`
    pub color: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Typed result of a label lookup; "not found" is an expected outcome that
/// drives creation, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelLookup {
    Found(LabelRecord),
    NotFound,
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("rate limit exceeded, resets in {reset_in:?}")]
    RateLimited { reset_in: Duration },
}

/// The four remote operations the labeling core depends on.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Look up a label by name.
    async fn get_label(&self, name: &str) -> Result<LabelLookup, GitHubError>;

    /// Create a label. A concurrent creator winning the race is treated as
    /// success.
    async fn create_label(
        &self,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<LabelRecord, GitHubError>;

    /// Add labels to an issue or pull request.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), GitHubError>;

    /// List the changed file paths of a pull request, in API order.
    async fn list_changed_files(&self, number: u64) -> Result<Vec<String>, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct GitHubApiError {
    message: String,
    #[serde(default)]
    errors: Vec<GitHubErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorDetail {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestFile {
    filename: String,
}

#[derive(Debug, Serialize)]
struct CreateLabelRequest<'a> {
    name: &'a str,
    color: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

/// GitHub REST API client scoped to one repository.
#[derive(Clone)]
pub struct GitHubClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo` authenticating with `token`.
    ///
    /// # Errors
    /// Returns `GitHubError::Http` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(token: String, owner: String, repo: String) -> Result<Self, GitHubError> {
        Self::with_base_url("https://api.github.com".to_string(), token, owner, repo)
    }

    /// Create a client against a custom API base URL (GitHub Enterprise,
    /// tests).
    pub fn with_base_url(
        base_url: String,
        token: String,
        owner: String,
        repo: String,
    ) -> Result<Self, GitHubError> {
        let http_client = HttpClient::builder()
            .user_agent("auto-labeler/0.3")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            owner,
            repo,
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/vnd.github+json")
    }

    /// Convert a non-success response into a typed error, distinguishing
    /// rate-limit 403s via the `x-ratelimit-remaining` header.
    async fn error_from_response(response: Response) -> GitHubError {
        let status = response.status();

        if status == StatusCode::FORBIDDEN && is_rate_limited(&response) {
            if let Some(reset_in) = rate_limit_reset(&response) {
                return GitHubError::RateLimited { reset_in };
            }
        }

        let message = match response.json::<GitHubApiError>().await {
            Ok(error) => error.message,
            Err(_) => "unreadable error body".to_string(),
        };
        GitHubError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

fn is_rate_limited(response: &Response) -> bool {
    response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .is_some_and(|remaining| remaining <= 0)
}

fn rate_limit_reset(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("x-ratelimit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<i64>().ok())
        .map(|reset_timestamp| {
            let now = chrono::Utc::now().timestamp();
            #[allow(clippy::cast_sign_loss)]
            let seconds_until_reset = (reset_timestamp - now).max(0) as u64;
            Duration::from_secs(seconds_until_reset)
        })
}

#[async_trait]
impl LabelStore for GitHubClient {
    #[instrument(skip(self), fields(label = %name))]
    async fn get_label(&self, name: &str) -> Result<LabelLookup, GitHubError> {
        let url = format!(
            "{}/repos/{}/{}/labels/{}",
            self.base_url,
            self.owner,
            self.repo,
            urlencoding::encode(name)
        );

        let response = self.request(reqwest::Method::GET, &url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let record: LabelRecord = response.json().await?;
                debug!("Label \"{}\" already exists", name);
                Ok(LabelLookup::Found(record))
            }
            StatusCode::NOT_FOUND => {
                debug!("Label \"{}\" not found", name);
                Ok(LabelLookup::NotFound)
            }
            _ => Err(Self::error_from_response(response).await),
        }
    }

    #[instrument(skip(self, description), fields(label = %name, color = %color))]
    async fn create_label(
        &self,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<LabelRecord, GitHubError> {
        let url = format!("{}/repos/{}/{}/labels", self.base_url, self.owner, self.repo);
        let body = CreateLabelRequest {
            name,
            color,
            description,
        };

        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let record: LabelRecord = response.json().await?;
            return Ok(record);
        }

        // A 422 already_exists means another run created the label after our
        // lookup returned not-found. The desired state holds either way.
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Ok(error) = response.json::<GitHubApiError>().await {
                if error
                    .errors
                    .iter()
                    .any(|detail| detail.code.as_deref() == Some("already_exists"))
                {
                    debug!("Label \"{}\" created by a concurrent run", name);
                    return Ok(LabelRecord {
                        name: name.to_string(),
                        color: color.to_string(),
                        description: description.map(str::to_string),
                    });
                }
                return Err(GitHubError::Api {
                    status: status.as_u16(),
                    message: error.message,
                });
            }
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message: "unreadable error body".to_string(),
            });
        }

        Err(Self::error_from_response(response).await)
    }

    #[instrument(skip(self), fields(number = %number, labels = ?labels))]
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), GitHubError> {
        if labels.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/repos/{}/{}/issues/{}/labels",
            self.base_url, self.owner, self.repo, number
        );

        let body = serde_json::json!({ "labels": labels });
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            debug!("Added {} labels to #{}", labels.len(), number);
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    #[instrument(skip(self), fields(number = %number))]
    async fn list_changed_files(&self, number: u64) -> Result<Vec<String>, GitHubError> {
        let mut files = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/repos/{}/{}/pulls/{}/files?per_page={}&page={}",
                self.base_url, self.owner, self.repo, number, FILES_PER_PAGE, page
            );

            let response = self.request(reqwest::Method::GET, &url).send().await?;
            if !response.status().is_success() {
                return Err(Self::error_from_response(response).await);
            }

            let batch: Vec<PullRequestFile> = response.json().await?;
            let batch_len = batch.len();
            files.extend(batch.into_iter().map(|f| f.filename));

            if batch_len < FILES_PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!("PR #{} has {} changed files", number, files.len());
        Ok(files)
    }
}
