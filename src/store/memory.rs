//! In-memory [`IssueStore`] with failure injection.
//!
//! Used by the integration tests and by `firecheck serve --in-memory`.
//! Every successful write is appended to a journal so callers can assert the
//! exact order of side effects.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use super::{
    Comment, Issue, IssuePatch, IssueQuery, IssueState, IssueStore, NewIssue, StoreError,
};

/// A successful write, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    CreateIssue { number: u64, title: String },
    UpdateIssue { number: u64, state: Option<IssueState> },
    CreateComment { issue_number: u64 },
}

#[derive(Default)]
struct Inner {
    issues: Vec<Issue>,
    comments: Vec<Comment>,
    journal: Vec<StoreOp>,
    next_number: u64,
    next_comment_id: u64,
    write_calls: usize,
    fail_list: bool,
    fail_close: bool,
    fail_write_calls: HashSet<usize>,
    fail_titles: Vec<String>,
}

/// Thread-safe in-memory issue tracker.
#[derive(Default)]
pub struct MemoryIssueStore {
    inner: Mutex<Inner>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryIssueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every record with `now` instead of the wall clock.
    #[must_use]
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Transport(format!("memory store lock poisoned: {e}")))
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Make every `list_issues` call fail.
    pub fn fail_listing(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_list = fail);
    }

    /// Make every close transition fail.
    pub fn fail_closing(&self, fail: bool) {
        self.with_inner(|inner| inner.fail_close = fail);
    }

    /// Fail the `n`-th write call (zero based, counting issue creates and comments).
    pub fn fail_write_call(&self, n: usize) {
        self.with_inner(|inner| {
            inner.fail_write_calls.insert(n);
        });
    }

    /// Fail creates and comments whose target title contains `needle`.
    pub fn fail_writes_matching(&self, needle: &str) {
        self.with_inner(|inner| inner.fail_titles.push(needle.to_string()));
    }

    /// Insert an issue directly, bypassing the journal and failure injection.
    pub fn seed(&self, issue: NewIssue, state: IssueState) -> Issue {
        let now = self.now();
        self.with_inner(|inner| {
            inner.next_number += 1;
            let seeded = Issue {
                number: inner.next_number,
                title: issue.title,
                body: issue.body,
                state,
                labels: issue.labels,
                created_at: now,
                updated_at: now,
                closed_at: (state == IssueState::Closed).then_some(now),
                html_url: format!("memory://issues/{}", inner.next_number),
            };
            inner.issues.push(seeded.clone());
            seeded
        })
    }

    #[must_use]
    pub fn issues(&self) -> Vec<Issue> {
        self.with_inner(|inner| inner.issues.clone())
    }

    #[must_use]
    pub fn issue(&self, number: u64) -> Option<Issue> {
        self.with_inner(|inner| inner.issues.iter().find(|i| i.number == number).cloned())
    }

    #[must_use]
    pub fn comments(&self) -> Vec<Comment> {
        self.with_inner(|inner| inner.comments.clone())
    }

    #[must_use]
    pub fn journal(&self) -> Vec<StoreOp> {
        self.with_inner(|inner| inner.journal.clone())
    }

    fn check_write(inner: &mut Inner, title: &str) -> Result<(), StoreError> {
        let call = inner.write_calls;
        inner.write_calls += 1;
        if inner.fail_write_calls.contains(&call) {
            return Err(StoreError::Injected(format!("write call {call}")));
        }
        if let Some(needle) = inner.fail_titles.iter().find(|n| title.contains(n.as_str())) {
            return Err(StoreError::Injected(format!("write matching '{needle}'")));
        }
        Ok(())
    }
}

impl IssueStore for MemoryIssueStore {
    fn list_issues(&self, query: &IssueQuery) -> Result<Vec<Issue>, StoreError> {
        let inner = self.lock()?;
        if inner.fail_list {
            return Err(StoreError::Injected("list_issues".to_string()));
        }
        Ok(inner
            .issues
            .iter()
            .filter(|i| query.state.matches(i.state))
            .filter(|i| query.labels.iter().all(|l| i.has_label(l)))
            .filter(|i| query.since.map_or(true, |since| i.updated_at >= since))
            .take(query.per_page as usize)
            .cloned()
            .collect())
    }

    fn get_issue(&self, number: u64) -> Result<Issue, StoreError> {
        self.lock()?
            .issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("issue #{number}")))
    }

    fn create_issue(&self, issue: &NewIssue) -> Result<Issue, StoreError> {
        let now = self.now();
        let mut inner = self.lock()?;
        Self::check_write(&mut inner, &issue.title)?;

        inner.next_number += 1;
        let number = inner.next_number;
        let created = Issue {
            number,
            title: issue.title.clone(),
            body: issue.body.clone(),
            state: IssueState::Open,
            labels: issue.labels.clone(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            html_url: format!("memory://issues/{number}"),
        };
        inner.issues.push(created.clone());
        inner.journal.push(StoreOp::CreateIssue {
            number,
            title: issue.title.clone(),
        });
        Ok(created)
    }

    fn update_issue(&self, number: u64, patch: &IssuePatch) -> Result<Issue, StoreError> {
        let now = self.now();
        let mut inner = self.lock()?;
        if inner.fail_close && patch.state == Some(IssueState::Closed) {
            return Err(StoreError::Injected(format!("close issue #{number}")));
        }

        let issue = inner
            .issues
            .iter_mut()
            .find(|i| i.number == number)
            .ok_or_else(|| StoreError::NotFound(format!("issue #{number}")))?;
        if let Some(state) = patch.state {
            issue.state = state;
            issue.closed_at = (state == IssueState::Closed).then_some(now);
        }
        if let Some(labels) = &patch.labels {
            issue.labels = labels.clone();
        }
        issue.updated_at = now;
        let updated = issue.clone();
        inner.journal.push(StoreOp::UpdateIssue {
            number,
            state: patch.state,
        });
        Ok(updated)
    }

    fn create_comment(&self, number: u64, body: &str) -> Result<Comment, StoreError> {
        let now = self.now();
        let mut inner = self.lock()?;
        let title = inner
            .issues
            .iter()
            .find(|i| i.number == number)
            .map(|i| i.title.clone())
            .ok_or_else(|| StoreError::NotFound(format!("issue #{number}")))?;
        Self::check_write(&mut inner, &title)?;

        inner.next_comment_id += 1;
        let comment = Comment {
            id: inner.next_comment_id,
            issue_number: number,
            body: body.to_string(),
            created_at: now,
        };
        inner.comments.push(comment.clone());
        if let Some(issue) = inner.issues.iter_mut().find(|i| i.number == number) {
            issue.updated_at = now;
        }
        inner.journal.push(StoreOp::CreateComment { issue_number: number });
        Ok(comment)
    }
}
