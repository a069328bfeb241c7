//! Forge API client for repository and commit listings.
//!
//! Paginates `GET /orgs/{org}/repos` and `GET /repos/{org}/{repo}/commits`
//! until an empty page comes back. Commits are kept as the raw JSON values
//! the API returned so the record store can preserve them verbatim.
//!
//! # Retry Strategy
//!
//! - HTTP 429, 5xx, and 403 with `x-ratelimit-remaining: 0` → retry
//! - Other HTTP 4xx → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5 units)

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::config::RetrieveConfig;

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("forge API returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
        rate_limited: bool,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ForgeError {
    fn is_retryable(&self) -> bool {
        match self {
            ForgeError::Status {
                status,
                rate_limited,
                ..
            } => *status == 429 || *status >= 500 || *rate_limited,
            ForgeError::Transport { .. } => true,
            ForgeError::Decode { .. } => false,
        }
    }
}

/// Commits fetched for one repository.
///
/// `incomplete` carries the error that stopped pagination early; the pages
/// fetched before it are still in `commits`.
#[derive(Debug, Default)]
pub struct CommitPages {
    pub commits: Vec<Value>,
    pub incomplete: Option<ForgeError>,
}

pub struct ForgeClient {
    http: reqwest::Client,
    api_base: String,
    org: String,
    token: Option<String>,
    per_page: u32,
    page_delay: Duration,
    max_retries: u32,
    backoff_unit: Duration,
}

impl ForgeClient {
    pub fn new(config: &RetrieveConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cscan/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            token: config.token(),
            per_page: config.per_page,
            page_delay: Duration::from_millis(config.page_delay_ms),
            max_retries: config.max_retries,
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Override the backoff unit (1s by default).
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Names of every repository in the organisation, in listing order.
    pub async fn list_repositories(&self) -> Result<Vec<String>, ForgeError> {
        let url = format!("{}/orgs/{}/repos", self.api_base, self.org);
        let mut names = Vec::new();
        let mut page = 1u32;

        loop {
            let items = self.get_page(&url, page, None).await?;
            if items.is_empty() {
                break;
            }
            for repo in &items {
                match repo.get("name").and_then(Value::as_str) {
                    Some(name) => names.push(name.to_string()),
                    None => tracing::warn!(page, "repository entry without a name; skipped"),
                }
            }
            page += 1;
        }

        Ok(names)
    }

    /// Every commit of `repo`, newest first, optionally only those after `since`.
    pub async fn list_commits(&self, repo: &str, since: Option<&str>) -> CommitPages {
        let url = format!("{}/repos/{}/{}/commits", self.api_base, self.org, repo);
        let mut pages = CommitPages::default();
        let mut page = 1u32;

        loop {
            match self.get_page(&url, page, since).await {
                Ok(items) if items.is_empty() => break,
                Ok(items) => {
                    tracing::debug!(repo, page, count = items.len(), "fetched commit page");
                    pages.commits.extend(items);
                }
                // An empty repository answers 409 Conflict
                Err(ForgeError::Status { status: 409, .. }) => break,
                Err(e) => {
                    tracing::warn!(repo, page, error = %e, "commit listing stopped early");
                    pages.incomplete = Some(e);
                    break;
                }
            }
            page += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        pages
    }

    async fn get_page(
        &self,
        url: &str,
        page: u32,
        since: Option<&str>,
    ) -> Result<Vec<Value>, ForgeError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1, 2, 4, 8, ... units
                let delay = self.backoff_unit * (1u32 << (attempt - 1).min(5));
                tracing::debug!(url, attempt, ?delay, "retrying forge request");
                tokio::time::sleep(delay).await;
            }

            match self.request_page(url, page, since).await {
                Ok(items) => return Ok(items),
                Err(e) if e.is_retryable() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| ForgeError::Decode {
            url: url.to_string(),
            message: "request failed after retries".to_string(),
        }))
    }

    async fn request_page(
        &self,
        url: &str,
        page: u32,
        since: Option<&str>,
    ) -> Result<Vec<Value>, ForgeError> {
        let mut request = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[("page", page.to_string()), ("per_page", self.per_page.to_string())]);
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|source| ForgeError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let rate_limited = status == StatusCode::FORBIDDEN
                && response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    == Some("0");
            let body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
                rate_limited,
            });
        }

        let json: Value = response.json().await.map_err(|source| ForgeError::Transport {
            url: url.to_string(),
            source,
        })?;

        match json {
            Value::Array(items) => Ok(items),
            other => Err(ForgeError::Decode {
                url: url.to_string(),
                message: format!("expected a JSON array, got {}", truncate(&other.to_string(), 120)),
            }),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
