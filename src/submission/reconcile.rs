//! Per-defect reconciliation against the open-defect index.

use chrono::Utc;
use std::collections::HashSet;

use crate::defects::{build_index, defect_body, defect_labels, defect_title, verification_comment};
use crate::model::{DefectKey, DefectRecord, InspectionSubmission, ReportedDefect};
use crate::store::{IssueStore, NewIssue, StoreError};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// What happened to one reported defect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefectAction {
    /// A new defect issue was opened.
    Created { issue: u64 },
    /// A verification comment was appended to an open issue.
    Verified { issue: u64 },
    /// The open issue was created by this same submission on an earlier attempt.
    AlreadyApplied { issue: u64 },
    /// The single write attempt failed.
    Failed { error: StoreError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectOutcome {
    pub key: DefectKey,
    pub action: DefectAction,
}

/// Result of reconciling every reported defect of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// One entry per reported defect, in report order.
    pub outcomes: Vec<DefectOutcome>,
    /// Set when the existing-defect lookup failed and was treated as empty.
    pub lookup_error: Option<String>,
}

impl ReconcileOutcome {
    /// Keys whose write failed, in report order.
    #[must_use]
    pub fn failures(&self) -> Vec<DefectKey> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, DefectAction::Failed { .. }))
            .map(|o| o.key.clone())
            .collect()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| !matches!(o.action, DefectAction::Failed { .. }))
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|a| matches!(a, DefectAction::Created { .. }))
    }

    #[must_use]
    pub fn verified(&self) -> usize {
        self.count(|a| matches!(a, DefectAction::Verified { .. }))
    }

    #[must_use]
    pub fn already_applied(&self) -> usize {
        self.count(|a| matches!(a, DefectAction::AlreadyApplied { .. }))
    }

    fn count(&self, pred: impl Fn(&DefectAction) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.action)).count()
    }
}

/// File every reported defect of `submission`.
///
/// Defects are written one at a time in report order. A key already open for
/// the apparatus gets a verification comment; otherwise a new issue is opened.
/// A key reported twice in one submission is filed once and the repeat is
/// recorded as a verification comment on that issue.
/// Each defect gets exactly one write attempt and a failure never stops the
/// remaining defects from being attempted.
pub fn reconcile(
    store: &dyn IssueStore,
    submission: &InspectionSubmission,
    page_size: u32,
) -> ReconcileOutcome {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::reconcile_span(&submission.apparatus, submission.defects.len()).entered();

    let mut index = build_index(store, &submission.apparatus, page_size);
    let submission_id = submission.id.as_str();
    let mut outcome = ReconcileOutcome {
        outcomes: Vec::with_capacity(submission.defects.len()),
        lookup_error: index.lookup_error().map(str::to_string),
    };

    // Keys already handled in this pass; repeats are recorded as comments.
    let mut seen: HashSet<DefectKey> = HashSet::new();

    for defect in &submission.defects {
        let key = defect.key();
        let repeat = !seen.insert(key.clone());
        let action = match index.get(&key) {
            Some(existing) if !repeat && existing.submission_id.as_deref() == Some(submission_id) => {
                log::debug!("{key} already filed as #{} by this submission", existing.tracking_id);
                DefectAction::AlreadyApplied {
                    issue: existing.tracking_id,
                }
            }
            Some(existing) => verify(store, submission, defect, existing.tracking_id),
            None => match open(store, submission, defect) {
                DefectAction::Created { issue } => {
                    index.insert(created_record(submission, defect, issue));
                    DefectAction::Created { issue }
                }
                other => other,
            },
        };

        if let DefectAction::Failed { error } = &action {
            #[cfg(feature = "metrics")]
            METRICS.record_defect_write_failed();
            log::warn!(
                "defect write for {key} on {} failed: {error}",
                submission.apparatus
            );
        }
        outcome.outcomes.push(DefectOutcome { key, action });
    }

    outcome
}

fn verify(
    store: &dyn IssueStore,
    submission: &InspectionSubmission,
    defect: &ReportedDefect,
    issue: u64,
) -> DefectAction {
    let body = verification_comment(defect, &submission.inspector, &submission.local_timestamp());
    match store.create_comment(issue, &body) {
        Ok(_) => {
            #[cfg(feature = "metrics")]
            METRICS.record_verification_comment();
            log::debug!("verified {} on #{issue}", defect.key());
            DefectAction::Verified { issue }
        }
        Err(error) => DefectAction::Failed { error },
    }
}

fn open(store: &dyn IssueStore, submission: &InspectionSubmission, defect: &ReportedDefect) -> DefectAction {
    let new_issue = NewIssue {
        title: defect_title(&submission.apparatus, &defect.compartment, &defect.item, defect.status),
        body: defect_body(
            &submission.apparatus,
            defect,
            &submission.inspector,
            &submission.local_timestamp(),
            Some(submission.id.as_str()),
        ),
        labels: defect_labels(&submission.apparatus, defect.status),
    };
    match store.create_issue(&new_issue) {
        Ok(issue) => {
            #[cfg(feature = "metrics")]
            METRICS.record_defect_created();
            log::debug!("opened #{} for {}", issue.number, defect.key());
            DefectAction::Created { issue: issue.number }
        }
        Err(error) => DefectAction::Failed { error },
    }
}

fn created_record(submission: &InspectionSubmission, defect: &ReportedDefect, issue: u64) -> DefectRecord {
    let now = Utc::now();
    DefectRecord {
        apparatus: submission.apparatus.clone(),
        compartment: defect.compartment.clone(),
        item: defect.item.clone(),
        status: defect.status,
        notes: defect.notes.clone().unwrap_or_default(),
        photo_url: defect.photo_url.clone(),
        reported_by: submission.inspector.display_name(),
        reported_at: now,
        updated_at: now,
        tracking_id: issue,
        resolved: false,
        submission_id: Some(submission.id.to_string()),
    }
}
