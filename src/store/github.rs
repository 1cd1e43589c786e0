//! GitHub Issues implementation of [`IssueStore`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::{Duration, Instant};

use super::{Comment, Issue, IssuePatch, IssueQuery, IssueState, IssueStore, NewIssue, StoreError};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("firecheck/", env!("CARGO_PKG_VERSION"));

/// Issue store backed by one GitHub repository.
pub struct GitHubIssueStore {
    agent: ureq::Agent,
    api_base_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubIssueStore {
    /// Create a store for `owner/repo`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if owner, repo or token is empty.
    pub fn new(
        api_base_url: &str,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<Self, StoreError> {
        if owner.is_empty() || repo.is_empty() {
            return Err(StoreError::Transport(
                "issue store requires both an owner and a repository".to_string(),
            ));
        }
        if token.is_empty() {
            return Err(StoreError::Transport("issue store token is empty".to_string()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build();

        Ok(Self {
            agent,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
        })
    }

    /// `owner/repo`
    #[must_use]
    pub fn repo_id(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.api_base_url, self.owner, self.repo, path)
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Accept", "application/vnd.github+json")
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    fn timed<T>(&self, op: &'static str, call: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_call_span(op).entered();

        let start = Instant::now();
        let result = call();
        let elapsed = start.elapsed();
        #[cfg(feature = "metrics")]
        METRICS.record_store_call(op, elapsed);
        if let Err(e) = &result {
            log::debug!("issue store {op} failed after {elapsed:?}: {e}");
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: IssueState,
    #[serde(default)]
    labels: Vec<GhLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: String,
    /// Present when the "issue" is really a pull request.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl From<GhIssue> for Issue {
    fn from(gh: GhIssue) -> Self {
        Issue {
            number: gh.number,
            title: gh.title,
            body: gh.body.unwrap_or_default(),
            state: gh.state,
            labels: gh.labels.into_iter().map(|l| l.name).collect(),
            created_at: gh.created_at,
            updated_at: gh.updated_at,
            closed_at: gh.closed_at,
            html_url: gh.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
}

impl IssueStore for GitHubIssueStore {
    fn list_issues(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
        self.timed("list_issues", || {
            let mut request = self
                .request("GET", &self.url("/issues"))
                .query("state", query.state.as_str())
                .query("per_page", &query.per_page.to_string());
            if !query.labels.is_empty() {
                request = request.query("labels", &query.labels.join(","));
            }
            if let Some(since) = query.since {
                request = request.query("since", &since.to_rfc3339());
            }

            let issues: Vec<GhIssue> = request.call()?.into_json()?;
            Ok(issues
                .into_iter()
                .filter(|i| i.pull_request.is_none())
                .map(Issue::from)
                .collect())
        })
    }

    fn get_issue(&self, number: u64) -> Result<Issue, StoreError> {
        self.timed("get_issue", || {
            let issue: GhIssue = self
                .request("GET", &self.url(&format!("/issues/{number}")))
                .call()
                .map_err(|e| match StoreError::from(e) {
                    StoreError::Api { status: 404, .. } => StoreError::NotFound(format!("issue #{number}")),
                    other => other,
                })?
                .into_json()?;
            if issue.pull_request.is_some() {
                return Err(StoreError::NotFound(format!("issue #{number}")));
            }
            Ok(issue.into())
        })
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue, StoreError> {
        self.timed("create_issue", || {
            let created: GhIssue = self
                .request("POST", &self.url("/issues"))
                .send_json(issue)?
                .into_json()?;
            Ok(created.into())
        })
    }

    fn update_issue(&self, number: u64, patch: &IssuePatch) -> Result<Issue, StoreError> {
        self.timed("update_issue", || {
            let updated: GhIssue = self
                .request("PATCH", &self.url(&format!("/issues/{number}")))
                .send_json(patch)
                .map_err(|e| match StoreError::from(e) {
                    StoreError::Api { status: 404, .. } => StoreError::NotFound(format!("issue #{number}")),
                    other => other,
                })?
                .into_json()?;
            Ok(updated.into())
        })
    }

    fn create_comment(&self, number: u64, body: &str) -> Result<Comment, StoreError> {
        self.timed("create_comment", || {
            let comment: GhComment = self
                .request("POST", &self.url(&format!("/issues/{number}/comments")))
                .send_json(serde_json::json!({ "body": body }))?
                .into_json()?;
            Ok(Comment {
                id: comment.id,
                issue_number: number,
                body: comment.body.unwrap_or_default(),
                created_at: comment.created_at,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_missing_settings() {
        assert!(GitHubIssueStore::new(DEFAULT_API_BASE_URL, "", "rigs", "t").is_err());
        assert!(GitHubIssueStore::new(DEFAULT_API_BASE_URL, "station7", "rigs", "").is_err());
    }

    #[test]
    fn test_url_building() {
        let store = GitHubIssueStore::new("https://ghe.example.org/api/v3/", "station7", "rigs", "t").unwrap();
        assert_eq!(store.repo_id(), "station7/rigs");
        assert_eq!(
            store.url("/issues/4/comments"),
            "https://ghe.example.org/api/v3/repos/station7/rigs/issues/4/comments"
        );
    }

    #[test]
    fn test_issue_payload_decoding_skips_pull_requests() {
        let json = r#"[
            {"number": 1, "title": "[Rescue 1] Cab: Radio - Damaged", "body": null, "state": "open",
             "labels": [{"name": "Defect"}, {"name": "Rescue 1"}],
             "created_at": "2026-10-01T10:00:00Z", "updated_at": "2026-10-01T10:00:00Z",
             "html_url": "https://github.com/station7/rigs/issues/1"},
            {"number": 2, "title": "PR", "state": "open", "labels": [],
             "created_at": "2026-10-01T10:00:00Z", "updated_at": "2026-10-01T10:00:00Z",
             "pull_request": {"url": "x"}}
        ]"#;
        let decoded: Vec<GhIssue> = serde_json::from_str(json).unwrap();
        let issues: Vec<Issue> = decoded
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(Issue::from)
            .collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].labels, vec!["Defect", "Rescue 1"]);
        assert_eq!(issues[0].body, "");
    }
}
