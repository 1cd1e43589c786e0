//! Issue store seam.
//!
//! The issue tracker is the system of record for defects and inspection logs.
//! [`IssueStore`] abstracts the five calls the rest of the crate needs so the
//! GitHub-backed implementation and the in-memory double are interchangeable.

mod error;
pub mod github;
pub mod memory;

pub use error::StoreError;
pub use github::{GitHubIssueStore, DEFAULT_API_BASE_URL};
pub use memory::{MemoryIssueStore, StoreOp};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum page size accepted by the tracker.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Issue lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// State filter for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl StateFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }

    #[must_use]
    pub fn matches(self, state: IssueState) -> bool {
        match self {
            Self::Open => state == IssueState::Open,
            Self::Closed => state == IssueState::Closed,
            Self::All => true,
        }
    }
}

/// An issue as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub html_url: String,
}

impl Issue {
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Issue comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub issue_number: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Filter for [`IssueStore::list_issues`]. Every label must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    pub state: StateFilter,
    pub labels: Vec<String>,
    pub since: Option<DateTime<Utc>>,
    pub per_page: u32,
}

impl IssueQuery {
    /// Open issues carrying all `labels`.
    #[must_use]
    pub fn open_with_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            state: StateFilter::Open,
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            since: None,
            per_page: MAX_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: StateFilter) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Page size, capped at [`MAX_PAGE_SIZE`].
    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        self
    }
}

/// Payload for creating an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Partial update of an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<IssueState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl IssuePatch {
    #[must_use]
    pub fn close() -> Self {
        Self {
            state: Some(IssueState::Closed),
            labels: None,
        }
    }
}

/// Trait for talking to the issue tracker
///
/// Every method performs exactly one request; callers decide whether a failure
/// is fatal. No method retries.
pub trait IssueStore: Send + Sync {
    /// List issues matching `query`, in the tracker's return order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` on transport failure or a non-2xx response.
    fn list_issues(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError>;

    /// Fetch one issue by number, in any state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown issue, or any transport/API error.
    fn get_issue(&self, number: u64) -> Result<Issue, StoreError>;

    /// Create an issue and return it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the issue could not be created.
    fn create_issue(&self, issue: &NewIssue) -> Result<Issue, StoreError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown issue, or any transport/API error.
    fn update_issue(&self, number: u64, patch: &IssuePatch) -> Result<Issue, StoreError>;

    /// Add a comment to an issue.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the comment could not be written.
    fn create_comment(&self, number: u64, body: &str) -> Result<Comment, StoreError>;
}
