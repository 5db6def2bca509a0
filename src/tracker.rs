//! Issue tracker (Jira Cloud) client.
//!
//! Issue URLs look like `https://{site}.atlassian.net/browse/{KEY}`. The
//! client fetches `https://{site}.atlassian.net/rest/api/3/issue/{KEY}` with
//! basic auth and maps the workflow status name onto [`TaskStatus`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::{ChronoError, Result};
use crate::model::TaskStatus;

const TRACKER_HOST_SUFFIX: &str = ".atlassian.net";
const BROWSE_PREFIX: &str = "/browse/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Account used to authenticate tracker requests.
#[derive(Clone, PartialEq, Eq)]
pub struct TrackerCredentials {
    pub email: String,
    pub api_token: String,
}

impl std::fmt::Debug for TrackerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerCredentials")
            .field("email", &self.email)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// Site and key parsed from an issue URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    /// Subdomain in front of `.atlassian.net`.
    pub site: String,
    /// Issue key, e.g. `PROJ-123`.
    pub key: String,
}

impl IssueRef {
    /// REST endpoint for this issue under `base` (scheme + host).
    fn api_url(&self, base: &str) -> String {
        format!(
            "{}/rest/api/3/issue/{}",
            base.trim_end_matches('/'),
            self.key
        )
    }

    fn site_base(&self) -> String {
        format!("https://{}{TRACKER_HOST_SUFFIX}", self.site)
    }
}

/// Parse an issue URL of the form `https://{site}.atlassian.net/browse/{KEY}`.
///
/// # Errors
///
/// [`ChronoError::InvalidTrackerUrl`] for anything else.
pub fn parse_issue_url(raw: &str) -> Result<IssueRef> {
    let invalid = || ChronoError::InvalidTrackerUrl(raw.to_owned());

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if url.scheme() != "https" {
        return Err(invalid());
    }

    let host = url.host_str().ok_or_else(invalid)?;
    let site = host
        .strip_suffix(TRACKER_HOST_SUFFIX)
        .filter(|s| !s.is_empty())
        .ok_or_else(invalid)?;

    let key = url
        .path()
        .strip_prefix(BROWSE_PREFIX)
        .filter(|k| !k.is_empty())
        .ok_or_else(invalid)?;

    Ok(IssueRef {
        site: site.to_owned(),
        key: key.to_owned(),
    })
}

/// Whether `raw` is a tracker issue URL.
pub fn is_tracker_url(raw: &str) -> bool {
    parse_issue_url(raw).is_ok()
}

/// Fields read from a fetched issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSnapshot {
    pub key: String,
    pub summary: String,
    /// Workflow status name; absent on some issue types.
    pub status: Option<String>,
}

impl IssueSnapshot {
    pub fn task_status(&self) -> TaskStatus {
        map_status(self.status.as_deref())
    }
}

/// Map a tracker workflow status name onto a [`TaskStatus`], ignoring case.
pub fn map_status(name: Option<&str>) -> TaskStatus {
    let Some(name) = name else {
        return TaskStatus::Unknown;
    };
    match name.trim().to_lowercase().as_str() {
        "new" | "candidate" => TaskStatus::Todo,
        "on hold" | "accepted" | "in progress" | "code review" | "merge" => TaskStatus::InProgress,
        "validation" | "final check" => TaskStatus::Validation,
        "done" | "close" | "closed" | "rejected" => TaskStatus::Done,
        _ => TaskStatus::Unknown,
    }
}

/// Fetches issue details from the tracker.
#[async_trait]
pub trait IssueTrackerClient: Send + Sync {
    /// Fetch the issue behind `issue_url`.
    async fn fetch_issue(
        &self,
        issue_url: &str,
        credentials: &TrackerCredentials,
    ) -> Result<IssueSnapshot>;
}

#[derive(Deserialize)]
struct IssueResponse {
    key: Option<String>,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    summary: Option<String>,
    status: Option<IssueStatusField>,
}

#[derive(Deserialize)]
struct IssueStatusField {
    name: Option<String>,
}

/// Jira Cloud REST v3 client.
#[derive(Debug, Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl Default for JiraClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JiraClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: None,
        }
    }

    /// Send every request to `base_url` instead of the issue's own site.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

#[async_trait]
impl IssueTrackerClient for JiraClient {
    async fn fetch_issue(
        &self,
        issue_url: &str,
        credentials: &TrackerCredentials,
    ) -> Result<IssueSnapshot> {
        let issue = parse_issue_url(issue_url)?;
        let base = self
            .base_url
            .clone()
            .unwrap_or_else(|| issue.site_base());
        let endpoint = issue.api_url(&base);

        tracing::debug!(key = %issue.key, "fetching issue");
        let response = self
            .client
            .get(&endpoint)
            .basic_auth(&credentials.email, Some(&credentials.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ChronoError::TrackerFetch(format!("{}: {e}", issue.key)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChronoError::TrackerFetch(format!(
                "{}: HTTP {status}: {}",
                issue.key,
                body.trim()
            )));
        }

        let parsed: IssueResponse = response.json().await.map_err(|e| {
            ChronoError::TrackerFetch(format!("{}: unexpected response: {e}", issue.key))
        })?;

        Ok(IssueSnapshot {
            key: parsed.key.unwrap_or(issue.key),
            summary: parsed.fields.summary.unwrap_or_default(),
            status: parsed.fields.status.and_then(|s| s.name),
        })
    }
}
