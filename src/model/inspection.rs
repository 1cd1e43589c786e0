//! Inspection submissions.
//!
//! A submission only lives for the duration of one submit call. What persists
//! are its side effects: defect issues and a single log issue.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::model::defect::{DefectKey, DefectStatus};
use crate::submission::SubmissionError;

/// Who performed the inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inspector {
    pub name: String,
    #[serde(default)]
    pub rank: String,
}

impl Inspector {
    /// `"{rank} {name}"`, or just the name when no rank was given.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.rank.trim().is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.rank, self.name)
        }
    }
}

/// Checklist outcome for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Present,
    Missing,
    Damaged,
}

impl ItemStatus {
    /// The defect status for a non-present item.
    #[must_use]
    pub const fn defect(self) -> Option<DefectStatus> {
        match self {
            Self::Present => None,
            Self::Missing => Some(DefectStatus::Missing),
            Self::Damaged => Some(DefectStatus::Damaged),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub compartment: String,
    #[serde(alias = "itemName")]
    pub item: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A non-present checklist item to be filed on the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedDefect {
    pub compartment: String,
    #[serde(alias = "itemName")]
    pub item: String,
    pub status: DefectStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl ReportedDefect {
    #[must_use]
    pub fn key(&self) -> DefectKey {
        DefectKey::new(&self.compartment, &self.item)
    }
}

/// Identifier embedded in every record a submission creates, so a retried
/// submission can recognise its own earlier writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Stable fingerprint of apparatus, timestamp and inspector name.
    #[must_use]
    pub fn fingerprint(apparatus: &str, timestamp: &DateTime<Utc>, inspector: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(apparatus.as_bytes());
        hasher.update([0u8]);
        hasher.update(timestamp.to_rfc3339().as_bytes());
        hasher.update([0u8]);
        hasher.update(inspector.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..16].to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire shape accepted from the inspection client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user: Inspector,
    pub apparatus: String,
    /// RFC 3339 timestamp of the inspection.
    pub date: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub defects: Vec<ReportedDefect>,
    #[serde(default)]
    pub submission_id: Option<String>,
}

/// A validated inspection, ready for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionSubmission {
    pub id: SubmissionId,
    pub inspector: Inspector,
    pub apparatus: String,
    pub timestamp: DateTime<Utc>,
    /// Offset the inspector's device reported; used for human-readable dates.
    pub utc_offset: FixedOffset,
    pub items: Vec<ChecklistItem>,
    /// Defects in the order the inspector reported them.
    pub defects: Vec<ReportedDefect>,
}

impl InspectionSubmission {
    /// Validate a client request.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Invalid` when the apparatus or inspector name is
    /// blank, the apparatus contains a comma, the date is not RFC 3339, or a
    /// defect has a blank compartment or item.
    pub fn from_request(request: SubmitRequest) -> Result<Self, SubmissionError> {
        let apparatus = request.apparatus.trim().to_string();
        if apparatus.is_empty() {
            return Err(SubmissionError::Invalid("apparatus is required".to_string()));
        }
        // Label filters are comma separated on the tracker.
        if apparatus.contains(',') {
            return Err(SubmissionError::Invalid(format!(
                "apparatus '{apparatus}' must not contain a comma"
            )));
        }
        if request.user.name.trim().is_empty() {
            return Err(SubmissionError::Invalid("inspector name is required".to_string()));
        }
        let reported = DateTime::parse_from_rfc3339(&request.date)
            .map_err(|e| SubmissionError::Invalid(format!("invalid date '{}': {e}", request.date)))?;
        let timestamp = reported.with_timezone(&Utc);

        for defect in &request.defects {
            if defect.compartment.trim().is_empty() || defect.item.trim().is_empty() {
                return Err(SubmissionError::Invalid(format!(
                    "defect '{}' needs both a compartment and an item",
                    defect.key()
                )));
            }
        }

        let id = match request.submission_id.filter(|s| !s.trim().is_empty()) {
            Some(id) => SubmissionId::new(id),
            None => SubmissionId::fingerprint(&apparatus, &timestamp, &request.user.name),
        };

        Ok(Self {
            id,
            inspector: request.user,
            apparatus,
            timestamp,
            utc_offset: *reported.offset(),
            items: request.items,
            defects: request.defects,
        })
    }

    /// Inspection time in the inspector's own offset.
    #[must_use]
    pub fn local_timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp.with_timezone(&self.utc_offset)
    }

    /// Items checked; falls back to the defect count when no checklist was sent.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.items.len().max(self.defects.len())
    }

    /// `"Compartment: Item - Status"` for each reported defect.
    #[must_use]
    pub fn defect_summary_lines(&self) -> Vec<String> {
        self.defects
            .iter()
            .map(|d| format!("{}: {} - {}", d.compartment, d.item, d.status))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SubmitRequest {
        SubmitRequest {
            user: Inspector {
                name: "Dana Reyes".to_string(),
                rank: "Lt.".to_string(),
            },
            apparatus: " Rescue 1 ".to_string(),
            date: "2026-10-19T07:30:00-04:00".to_string(),
            items: vec![],
            defects: vec![ReportedDefect {
                compartment: "Cab".to_string(),
                item: "Flashlight".to_string(),
                status: DefectStatus::Missing,
                notes: None,
                photo_url: None,
            }],
            submission_id: None,
        }
    }

    #[test]
    fn test_from_request_normalises_fields() {
        let submission = InspectionSubmission::from_request(request()).unwrap();
        assert_eq!(submission.apparatus, "Rescue 1");
        assert_eq!(submission.timestamp.to_rfc3339(), "2026-10-19T11:30:00+00:00");
        assert_eq!(submission.local_timestamp().to_rfc3339(), "2026-10-19T07:30:00-04:00");
        assert_eq!(submission.id.as_str().len(), 16);
        assert_eq!(submission.total_items(), 1);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = InspectionSubmission::from_request(request()).unwrap();
        let b = InspectionSubmission::from_request(request()).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_client_supplied_id_wins() {
        let mut req = request();
        req.submission_id = Some("abc-123".to_string());
        let submission = InspectionSubmission::from_request(req).unwrap();
        assert_eq!(submission.id.as_str(), "abc-123");
    }

    #[test]
    fn test_rejects_bad_date_and_blank_fields() {
        let mut req = request();
        req.date = "yesterday".to_string();
        assert!(matches!(
            InspectionSubmission::from_request(req),
            Err(SubmissionError::Invalid(_))
        ));

        let mut req = request();
        req.apparatus = "  ".to_string();
        assert!(InspectionSubmission::from_request(req).is_err());

        let mut req = request();
        req.defects[0].item = String::new();
        assert!(InspectionSubmission::from_request(req).is_err());
    }

    #[test]
    fn test_rejects_comma_in_apparatus() {
        let mut req = request();
        req.apparatus = "Engine 1, Reserve".to_string();
        assert!(matches!(
            InspectionSubmission::from_request(req),
            Err(SubmissionError::Invalid(msg)) if msg.contains("comma")
        ));
    }

    #[test]
    fn test_request_wire_shape() {
        let json = r#"{
            "user": {"name": "Sam Ortiz", "rank": "FF"},
            "apparatus": "Engine 2",
            "date": "2026-10-19T08:00:00Z",
            "items": [{"compartment": "Cab", "itemName": "Radio", "status": "damaged"}],
            "defects": [{"compartment": "Cab", "item": "Radio", "status": "damaged", "photoUrl": "https://x/p.jpg"}]
        }"#;
        let req: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.items[0].status.defect(), Some(DefectStatus::Damaged));
        assert_eq!(req.defects[0].photo_url.as_deref(), Some("https://x/p.jpg"));
    }
}
