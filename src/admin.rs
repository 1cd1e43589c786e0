//! Admin-scoped operations.
//!
//! Authentication produces an [`AdminSession`] value. Every admin operation on
//! [`AdminConsole`] takes the session by reference, so there is no
//! process-wide "logged in" flag to set or clear.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::analytics::{
    compute_fleet_status, low_stock_items, submission_report, FleetStatus, LowStockItem,
    SubmissionReport, ANALYSIS_WINDOW_DAYS,
};
use crate::defects::{list_open_defects, parse_defect_issue};
use crate::insights::{InsightsClient, InsightsResponse};
use crate::logbook::parse_log_issue;
use crate::model::{labels, DefectRecord, LogRecord};
use crate::store::{IssuePatch, IssueQuery, IssueState, IssueStore, StateFilter, StoreError, MAX_PAGE_SIZE};

/// Admin error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// Supplied password did not match
    InvalidPassword,
    /// No admin password is configured
    NotConfigured,
    /// Underlying issue store failed
    Store(StoreError),
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminError::InvalidPassword => write!(f, "Invalid admin password"),
            AdminError::NotConfigured => write!(f, "Admin access is not configured"),
            AdminError::Store(e) => write!(f, "Issue store error: {e}"),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        AdminError::Store(err)
    }
}

/// Proof of a successful admin login. Only [`AdminGate::authenticate`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    id: Uuid,
    authenticated_at: DateTime<Utc>,
}

impl AdminSession {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn authenticated_at(&self) -> DateTime<Utc> {
        self.authenticated_at
    }
}

/// Checks the shared admin password.
pub struct AdminGate {
    digest: Option<[u8; 32]>,
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl AdminGate {
    #[must_use]
    pub fn new(password: Option<&str>) -> Self {
        Self {
            digest: password.filter(|p| !p.is_empty()).map(digest),
        }
    }

    /// # Errors
    ///
    /// `AdminError::NotConfigured` when no password is set,
    /// `AdminError::InvalidPassword` on mismatch.
    pub fn authenticate(&self, password: &str) -> Result<AdminSession, AdminError> {
        let expected = self.digest.ok_or(AdminError::NotConfigured)?;
        let supplied = digest(password);
        // Compare every byte regardless of where the first mismatch is.
        let diff = expected
            .iter()
            .zip(supplied.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            log::warn!("admin authentication failed");
            return Err(AdminError::InvalidPassword);
        }
        let session = AdminSession {
            id: Uuid::new_v4(),
            authenticated_at: Utc::now(),
        };
        log::info!("admin session {} opened", session.id);
        Ok(session)
    }
}

/// Admin dashboard reads and the resolve action.
pub struct AdminConsole {
    store: Arc<dyn IssueStore>,
    apparatus: Vec<String>,
    insights: InsightsClient,
    utc_offset: FixedOffset,
    page_size: u32,
}

impl AdminConsole {
    #[must_use]
    pub fn new(store: Arc<dyn IssueStore>, apparatus: Vec<String>) -> Self {
        Self {
            store,
            apparatus,
            insights: InsightsClient::disabled(),
            utc_offset: Utc.fix(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_insights(mut self, insights: InsightsClient) -> Self {
        self.insights = insights;
        self
    }

    /// Offset used to decide what "today" means for submission compliance.
    #[must_use]
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn apparatus(&self) -> &[String] {
        &self.apparatus
    }

    /// All open defects across the fleet.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Store` if the listing fails.
    pub fn open_defects(&self, _session: &AdminSession) -> Result<Vec<DefectRecord>, AdminError> {
        Ok(list_open_defects(self.store.as_ref(), self.page_size)?)
    }

    /// Close a defect and label it resolved. Other labels are kept.
    ///
    /// A later report of the same key files a new issue; this one is never reopened.
    ///
    /// # Errors
    ///
    /// `AdminError::Store(StoreError::NotFound)` when `number` is not an open
    /// defect, or any store error from the update.
    pub fn resolve_defect(&self, session: &AdminSession, number: u64) -> Result<DefectRecord, AdminError> {
        let issue = self.store.get_issue(number)?;
        if issue.state != IssueState::Open || !issue.has_label(labels::DEFECT) {
            return Err(StoreError::NotFound(format!("open defect #{number}")).into());
        }

        let mut new_labels = issue.labels.clone();
        if !issue.has_label(labels::RESOLVED) {
            new_labels.push(labels::RESOLVED.to_string());
        }
        let patch = IssuePatch {
            state: Some(IssueState::Closed),
            labels: Some(new_labels),
        };
        let updated = self.store.update_issue(number, &patch)?;

        let note = format!(
            "Resolved by admin on {}.",
            Utc::now().with_timezone(&self.utc_offset).format("%Y-%m-%d")
        );
        if let Err(e) = self.store.create_comment(number, &note) {
            log::warn!("defect #{number} resolved but note not added: {e}");
        }
        log::info!("admin session {} resolved defect #{number}", session.id);

        parse_defect_issue(&updated)
            .ok_or_else(|| AdminError::Store(StoreError::Parse(format!("issue #{number} is not a defect"))))
    }

    /// Open-defect counts for every configured apparatus.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Store` if the listing fails.
    pub fn fleet_status(&self, _session: &AdminSession) -> Result<FleetStatus, AdminError> {
        let defects = list_open_defects(self.store.as_ref(), self.page_size)?;
        Ok(compute_fleet_status(&self.apparatus, &defects))
    }

    /// Inspection logs from the last 30 days.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Store` if the listing fails.
    pub fn recent_logs(&self, _session: &AdminSession, now: DateTime<Utc>) -> Result<Vec<LogRecord>, AdminError> {
        let query = IssueQuery::open_with_labels(&[labels::LOG])
            .with_state(StateFilter::All)
            .with_since(now - Duration::days(ANALYSIS_WINDOW_DAYS))
            .with_per_page(self.page_size);
        Ok(self
            .store
            .list_issues(&query)?
            .iter()
            .filter_map(parse_log_issue)
            .collect())
    }

    /// Today's submissions and 30-day totals per apparatus.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Store` if the listing fails.
    pub fn submissions_report(&self, session: &AdminSession, now: DateTime<Utc>) -> Result<SubmissionReport, AdminError> {
        let logs = self.recent_logs(session, now)?;
        Ok(submission_report(&self.apparatus, &logs, now, self.utc_offset))
    }

    /// Items reported missing at least twice in the last 30 days.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Store` if the listing fails.
    pub fn low_stock(&self, _session: &AdminSession, now: DateTime<Utc>) -> Result<Vec<LowStockItem>, AdminError> {
        let query = IssueQuery::open_with_labels(&[labels::DEFECT])
            .with_state(StateFilter::All)
            .with_since(now - Duration::days(ANALYSIS_WINDOW_DAYS))
            .with_per_page(self.page_size);
        let defects: Vec<DefectRecord> = self
            .store
            .list_issues(&query)?
            .iter()
            .filter_map(parse_defect_issue)
            .collect();
        Ok(low_stock_items(&defects, now))
    }

    /// # Errors
    ///
    /// Returns `AdminError::Store` when the insights service is configured but fails.
    pub fn inventory(&self, _session: &AdminSession) -> Result<InsightsResponse, AdminError> {
        Ok(self.insights.inventory()?)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Store` when the insights service is configured but fails.
    pub fn insights(&self, _session: &AdminSession) -> Result<InsightsResponse, AdminError> {
        Ok(self.insights.insights()?)
    }

    /// # Errors
    ///
    /// Returns `AdminError::Store` when the insights service is configured but fails.
    pub fn generate_insight(&self, _session: &AdminSession) -> Result<InsightsResponse, AdminError> {
        Ok(self.insights.generate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defects::{defect_body, defect_labels, defect_title};
    use crate::model::{DefectStatus, Inspector, ReportedDefect};
    use crate::store::{MemoryIssueStore, NewIssue};

    fn seed_defect(store: &MemoryIssueStore, apparatus: &str, item: &str) -> u64 {
        let defect = ReportedDefect {
            compartment: "Cab".to_string(),
            item: item.to_string(),
            status: DefectStatus::Missing,
            notes: None,
            photo_url: None,
        };
        let inspector = Inspector {
            name: "Dana Reyes".to_string(),
            rank: "Lt".to_string(),
        };
        store
            .seed(
                NewIssue {
                    title: defect_title(apparatus, "Cab", item, DefectStatus::Missing),
                    body: defect_body(apparatus, &defect, &inspector, &Utc::now().fixed_offset(), None),
                    labels: defect_labels(apparatus, DefectStatus::Missing),
                },
                IssueState::Open,
            )
            .number
    }

    #[test]
    fn test_authenticate() {
        let gate = AdminGate::new(Some("engine-house"));
        assert_eq!(gate.authenticate("wrong").unwrap_err(), AdminError::InvalidPassword);
        assert!(gate.authenticate("engine-house").is_ok());
        assert_eq!(
            AdminGate::new(None).authenticate("anything").unwrap_err(),
            AdminError::NotConfigured
        );
        assert_eq!(
            AdminGate::new(Some("")).authenticate("").unwrap_err(),
            AdminError::NotConfigured
        );
    }

    #[test]
    fn test_resolve_closes_and_keeps_labels() {
        let store = Arc::new(MemoryIssueStore::new());
        let number = seed_defect(&store, "Engine 1", "Flashlight");
        let console = AdminConsole::new(store.clone(), vec!["Engine 1".to_string()]);
        let session = AdminGate::new(Some("pw")).authenticate("pw").unwrap();

        let resolved = console.resolve_defect(&session, number).unwrap();
        assert!(resolved.resolved);
        let issue = store.issue(number).unwrap();
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(issue.labels, vec!["Defect", "Engine 1", "Resolved"]);
        assert_eq!(store.comments().len(), 1);

        assert_eq!(console.fleet_status(&session).unwrap().get("Engine 1"), Some(0));
        assert!(matches!(
            console.resolve_defect(&session, number),
            Err(AdminError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_resolve_reaches_defects_beyond_one_page() {
        let store = Arc::new(MemoryIssueStore::new());
        let mut last = 0;
        for n in 0..=MAX_PAGE_SIZE {
            last = seed_defect(&store, "Engine 1", &format!("Item {n}"));
        }
        let console = AdminConsole::new(store.clone(), vec!["Engine 1".to_string()]);
        let session = AdminGate::new(Some("pw")).authenticate("pw").unwrap();

        let resolved = console.resolve_defect(&session, last).unwrap();
        assert_eq!(resolved.tracking_id, last);
        assert_eq!(store.issue(last).unwrap().state, IssueState::Closed);
    }

    #[test]
    fn test_resolve_rejects_non_defect_issues() {
        let store = Arc::new(MemoryIssueStore::new());
        let log = store
            .seed(
                NewIssue {
                    title: "[Engine 1] Daily Inspection - 2026-10-19".to_string(),
                    body: String::new(),
                    labels: vec!["Log".to_string(), "Engine 1".to_string()],
                },
                IssueState::Open,
            )
            .number;
        let console = AdminConsole::new(store.clone(), vec!["Engine 1".to_string()]);
        let session = AdminGate::new(Some("pw")).authenticate("pw").unwrap();

        assert!(matches!(
            console.resolve_defect(&session, log),
            Err(AdminError::Store(StoreError::NotFound(_)))
        ));
        assert!(matches!(
            console.resolve_defect(&session, 999),
            Err(AdminError::Store(StoreError::NotFound(_)))
        ));
        assert!(store.journal().is_empty());
    }

    #[test]
    fn test_fleet_status_and_listing_failure() {
        let store = Arc::new(MemoryIssueStore::new());
        seed_defect(&store, "Engine 1", "Flashlight");
        seed_defect(&store, "Engine 1", "Radio");
        seed_defect(&store, "Rescue 1", "Radio");
        let console = AdminConsole::new(
            store.clone(),
            vec!["Engine 1".to_string(), "Rescue 1".to_string(), "Ladder 3".to_string()],
        );
        let session = AdminGate::new(Some("pw")).authenticate("pw").unwrap();

        let status = console.fleet_status(&session).unwrap();
        assert_eq!(status.get("Engine 1"), Some(2));
        assert_eq!(status.get("Ladder 3"), Some(0));
        assert_eq!(status.total(), 3);

        store.fail_listing(true);
        assert!(matches!(console.fleet_status(&session), Err(AdminError::Store(_))));
    }

    #[test]
    fn test_insights_not_configured() {
        let console = AdminConsole::new(Arc::new(MemoryIssueStore::new()), vec![]);
        let session = AdminGate::new(Some("pw")).authenticate("pw").unwrap();
        assert_eq!(console.insights(&session).unwrap(), InsightsResponse::NotConfigured);
    }
}
