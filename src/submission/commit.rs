//! Log-gated commit of a reconciled submission.
//!
//! The log issue is written only when every defect write succeeded, and at most
//! once per submission id. Everything after the log issue exists (closing it,
//! supply tasks) is best effort and reported as [`SoftFailure`]s rather than
//! errors.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::logbook::{find_submission_log, log_body, log_labels, log_title, ReceiptContent};
use crate::model::{InspectionSubmission, LogRecord};
use crate::receipt::{render_markdown, ReceiptDocument, ReceiptStore};
use crate::store::{IssuePatch, IssueStore, NewIssue};
use crate::submission::reconcile::ReconcileOutcome;
use crate::submission::SubmissionError;
use crate::supply::{derive_supply_tasks, SupplyJob, SupplyQueue};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Which best-effort step degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftFailureKind {
    /// Existing-defect lookup failed; defects were filed as new.
    DefectLookup,
    /// Earlier log for this submission could not be checked; a new one was written.
    LogLookup,
    /// Hosted receipt could not be published; content was inlined.
    ReceiptPublish,
    /// Log issue could not be closed and remains open.
    LogClose,
    /// Supply tasks could not be queued.
    SupplyTasks,
}

impl SoftFailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DefectLookup => "defect_lookup",
            Self::LogLookup => "log_lookup",
            Self::ReceiptPublish => "receipt_publish",
            Self::LogClose => "log_close",
            Self::SupplyTasks => "supply_tasks",
        }
    }
}

/// A degraded best-effort step. Never shown to the inspector as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftFailure {
    pub kind: SoftFailureKind,
    pub message: String,
}

impl SoftFailure {
    fn new(kind: SoftFailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        #[cfg(feature = "metrics")]
        METRICS.record_soft_failure(kind.as_str());
        log::warn!("{}: {message}", kind.as_str());
        Self { kind, message }
    }
}

/// Optional collaborators used after the log gate opens.
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub receipts: Option<&'a dyn ReceiptStore>,
    pub supply: Option<&'a SupplyQueue>,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    pub log: LogRecord,
    /// The log was written by an earlier attempt with the same submission id.
    pub log_reused: bool,
    pub soft_failures: Vec<SoftFailure>,
}

/// Write the inspection log for a reconciled submission.
///
/// # Errors
///
/// Returns `SubmissionError::PartiallyFailed` with the failed keys when any
/// defect write failed; no log issue or receipt is produced in that case and
/// already-written defect issues are left in place. Returns
/// `SubmissionError::LogWrite` if the log issue itself cannot be created.
///
/// When a log carrying the same submission id already exists it is returned
/// as is; no receipt, log issue or supply job is produced a second time.
pub fn commit(
    store: &dyn IssueStore,
    collaborators: Collaborators<'_>,
    submission: &InspectionSubmission,
    reconciled: &ReconcileOutcome,
    page_size: u32,
) -> Result<CommitOutcome, SubmissionError> {
    let failed = reconciled.failures();
    if !failed.is_empty() {
        return Err(SubmissionError::PartiallyFailed { failed });
    }

    let mut soft_failures = Vec::new();
    if let Some(e) = &reconciled.lookup_error {
        soft_failures.push(SoftFailure::new(
            SoftFailureKind::DefectLookup,
            format!("existing defects for {} could not be read: {e}", submission.apparatus),
        ));
    }

    // Tolerates skew between the inspector's clock and the tracker's.
    let since = submission.timestamp.min(Utc::now()) - Duration::days(1);
    match find_submission_log(
        store,
        &submission.apparatus,
        submission.id.as_str(),
        since,
        page_size,
    ) {
        Ok(Some(log)) => {
            log::info!("submission {} already logged as #{}", submission.id, log.tracking_id);
            return Ok(CommitOutcome {
                log,
                log_reused: true,
                soft_failures,
            });
        }
        Ok(None) => {}
        Err(e) => soft_failures.push(SoftFailure::new(
            SoftFailureKind::LogLookup,
            format!("earlier log for {} could not be checked: {e}", submission.id),
        )),
    }

    let document = ReceiptDocument::from_submission(submission);
    let receipt = match collaborators.receipts {
        Some(receipts) => match receipts.create(&document) {
            Ok(hosted) => ReceiptContent::Hosted(hosted),
            Err(e) => {
                soft_failures.push(SoftFailure::new(
                    SoftFailureKind::ReceiptPublish,
                    format!("hosted receipt failed, embedding inline: {e}"),
                ));
                ReceiptContent::Inline(render_markdown(&document))
            }
        },
        None => ReceiptContent::Inline(render_markdown(&document)),
    };

    let mut log = LogRecord {
        apparatus: submission.apparatus.clone(),
        timestamp: submission.timestamp,
        inspector: submission.inspector.display_name(),
        total_items: submission.total_items(),
        issues_found: submission.defects.len(),
        defect_summary: submission.defect_summary_lines(),
        receipt_url: match &receipt {
            ReceiptContent::Hosted(hosted) => Some(hosted.url.clone()),
            ReceiptContent::Inline(_) => None,
        },
        submission_id: Some(submission.id.to_string()),
        tracking_id: 0,
    };

    let issue = store
        .create_issue(&NewIssue {
            title: log_title(&log.apparatus, &submission.local_timestamp()),
            body: log_body(&log, &receipt, submission.utc_offset),
            labels: log_labels(&log.apparatus),
        })
        .map_err(SubmissionError::LogWrite)?;
    log.tracking_id = issue.number;

    if let Err(e) = store.update_issue(issue.number, &IssuePatch::close()) {
        soft_failures.push(SoftFailure::new(
            SoftFailureKind::LogClose,
            format!("log issue #{} left open: {e}", issue.number),
        ));
    }

    if let (Some(queue), false) = (collaborators.supply, submission.defects.is_empty()) {
        let job = SupplyJob {
            submission_id: submission.id.to_string(),
            apparatus: submission.apparatus.clone(),
            tasks: derive_supply_tasks(&submission.apparatus, &submission.defects),
        };
        if let Err(e) = queue.enqueue(job) {
            soft_failures.push(SoftFailure::new(SoftFailureKind::SupplyTasks, e.to_string()));
        }
    }

    Ok(CommitOutcome {
        log,
        log_reused: false,
        soft_failures,
    })
}
