//! Inspection submission: reconcile reported defects, then gate the log.
//!
//! A submission is all-or-nothing from the inspector's point of view: the log
//! issue and receipt exist only if every defect write succeeded. Defect writes
//! that did succeed are not rolled back when a sibling fails; a retry with the
//! same submission id skips them.

pub mod commit;
pub mod reconcile;

pub use commit::{commit, Collaborators, CommitOutcome, SoftFailure, SoftFailureKind};
pub use reconcile::{reconcile, DefectAction, DefectOutcome, ReconcileOutcome};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::model::{DefectKey, InspectionSubmission, SubmitRequest};
use crate::receipt::ReceiptStore;
use crate::store::{IssueStore, StoreError, MAX_PAGE_SIZE};
use crate::supply::SupplyQueue;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Submission error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// Request failed validation; nothing was written
    Invalid(String),
    /// At least one defect write failed; no log entry was written
    PartiallyFailed { failed: Vec<DefectKey> },
    /// Every defect was filed but the log issue could not be created
    LogWrite(StoreError),
}

impl fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionError::Invalid(s) => write!(f, "Invalid submission: {s}"),
            SubmissionError::PartiallyFailed { failed } => {
                let keys: Vec<&str> = failed.iter().map(DefectKey::as_str).collect();
                write!(f, "{} defect(s) failed: {}", failed.len(), keys.join(", "))
            }
            SubmissionError::LogWrite(e) => write!(f, "Failed to write inspection log: {e}"),
        }
    }
}

impl std::error::Error for SubmissionError {}

/// Returned to the inspector when a submission is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAccepted {
    pub submission_id: String,
    pub apparatus: String,
    pub log_issue: u64,
    /// The log was already written by an earlier attempt with this submission id.
    pub log_reused: bool,
    pub defects_created: usize,
    pub defects_verified: usize,
    pub defects_already_filed: usize,
    pub receipt_url: Option<String>,
    /// Degraded best-effort steps; informational only.
    pub soft_failures: Vec<SoftFailure>,
}

/// Accepts inspections and drives reconcile + commit against the issue store.
#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn IssueStore>,
    receipts: Option<Arc<dyn ReceiptStore>>,
    supply: Option<SupplyQueue>,
    page_size: u32,
}

impl SubmissionService {
    #[must_use]
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self {
            store,
            receipts: None,
            supply: None,
            page_size: MAX_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_receipts(mut self, receipts: Arc<dyn ReceiptStore>) -> Self {
        self.receipts = Some(receipts);
        self
    }

    #[must_use]
    pub fn with_supply(mut self, supply: SupplyQueue) -> Self {
        self.supply = Some(supply);
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn IssueStore {
        self.store.as_ref()
    }

    /// Validate and submit a client request.
    ///
    /// # Errors
    ///
    /// See [`SubmissionService::submit_inspection`]; also returns
    /// `SubmissionError::Invalid` when validation fails.
    pub fn submit(&self, request: SubmitRequest) -> Result<SubmissionAccepted, SubmissionError> {
        let submission = InspectionSubmission::from_request(request)?;
        self.submit_inspection(&submission)
    }

    /// Reconcile every reported defect, then write the log if all succeeded.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::PartiallyFailed` listing the failed keys, or
    /// `SubmissionError::LogWrite` when the log issue cannot be created.
    pub fn submit_inspection(
        &self,
        submission: &InspectionSubmission,
    ) -> Result<SubmissionAccepted, SubmissionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::submission_span(&submission.apparatus, submission.id.as_str()).entered();

        log::info!(
            "submission {} for {} by {}: {} defect(s)",
            submission.id,
            submission.apparatus,
            submission.inspector.display_name(),
            submission.defects.len()
        );

        let reconciled = reconcile(self.store.as_ref(), submission, self.page_size);
        let collaborators = Collaborators {
            receipts: self.receipts.as_deref(),
            supply: self.supply.as_ref(),
        };

        match commit(self.store.as_ref(), collaborators, submission, &reconciled, self.page_size) {
            Ok(committed) => {
                #[cfg(feature = "metrics")]
                METRICS.record_submission(true);
                log::info!(
                    "submission {} accepted: log #{}, {} created, {} verified",
                    submission.id,
                    committed.log.tracking_id,
                    reconciled.created(),
                    reconciled.verified()
                );
                Ok(SubmissionAccepted {
                    submission_id: submission.id.to_string(),
                    apparatus: submission.apparatus.clone(),
                    log_issue: committed.log.tracking_id,
                    log_reused: committed.log_reused,
                    defects_created: reconciled.created(),
                    defects_verified: reconciled.verified(),
                    defects_already_filed: reconciled.already_applied(),
                    receipt_url: committed.log.receipt_url,
                    soft_failures: committed.soft_failures,
                })
            }
            Err(e) => {
                #[cfg(feature = "metrics")]
                METRICS.record_submission(false);
                log::error!("submission {} rejected: {e}", submission.id);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefectStatus, Inspector, ReportedDefect};
    use crate::store::{IssueState, MemoryIssueStore, StoreOp};

    fn request(defects: &[(&str, &str, DefectStatus)]) -> SubmitRequest {
        SubmitRequest {
            user: Inspector {
                name: "Sam Ortiz".to_string(),
                rank: "FF".to_string(),
            },
            apparatus: "Engine 2".to_string(),
            date: "2026-10-19T08:00:00Z".to_string(),
            items: vec![],
            defects: defects
                .iter()
                .map(|(c, i, s)| ReportedDefect {
                    compartment: (*c).to_string(),
                    item: (*i).to_string(),
                    status: *s,
                    notes: None,
                    photo_url: None,
                })
                .collect(),
            submission_id: None,
        }
    }

    #[test]
    fn test_partial_failure_message_lists_keys() {
        let err = SubmissionError::PartiallyFailed {
            failed: vec![DefectKey::new("Cab", "Radio"), DefectKey::new("Rear", "Cones")],
        };
        assert_eq!(err.to_string(), "2 defect(s) failed: Cab:Radio, Rear:Cones");
    }

    #[test]
    fn test_clean_inspection_writes_closed_log() {
        let store = Arc::new(MemoryIssueStore::new());
        let service = SubmissionService::new(store.clone());
        let accepted = service.submit(request(&[])).unwrap();

        let log = store.issue(accepted.log_issue).unwrap();
        assert_eq!(log.state, IssueState::Closed);
        assert_eq!(log.labels, vec!["Log", "Engine 2"]);
        assert!(log.body.contains("No defects reported."));
        assert!(log.body.contains("### Inspection Receipt"));
        assert!(accepted.soft_failures.is_empty());
    }

    #[test]
    fn test_log_write_failure_is_hard() {
        let store = Arc::new(MemoryIssueStore::new());
        store.fail_writes_matching("Daily Inspection");
        let service = SubmissionService::new(store.clone());
        let err = service
            .submit(request(&[("Cab", "Radio", DefectStatus::Damaged)]))
            .unwrap_err();
        assert!(matches!(err, SubmissionError::LogWrite(_)));
        assert_eq!(store.journal().len(), 1);
    }

    #[test]
    fn test_log_close_failure_is_soft() {
        let store = Arc::new(MemoryIssueStore::new());
        store.fail_closing(true);
        let service = SubmissionService::new(store.clone());
        let accepted = service.submit(request(&[])).unwrap();
        assert_eq!(accepted.soft_failures.len(), 1);
        assert_eq!(accepted.soft_failures[0].kind, SoftFailureKind::LogClose);
        assert_eq!(store.issue(accepted.log_issue).unwrap().state, IssueState::Open);
        assert!(matches!(store.journal()[0], StoreOp::CreateIssue { .. }));
    }

    #[test]
    fn test_invalid_request_writes_nothing() {
        let store = Arc::new(MemoryIssueStore::new());
        let service = SubmissionService::new(store.clone());
        let mut req = request(&[]);
        req.date = "not a date".to_string();
        assert!(matches!(service.submit(req), Err(SubmissionError::Invalid(_))));
        assert!(store.journal().is_empty());
    }
}
