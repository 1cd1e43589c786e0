//! Inspection log issues: rendering and reading back.

use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{labels, LogRecord};
use crate::receipt::HostedReceipt;
use crate::store::{Issue, IssueQuery, IssueStore, StateFilter, StoreError};

static LOG_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(.+?)\] Daily Inspection - ").expect("log title regex"));

static LOG_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- firecheck-log:(\{.*?\}) -->").expect("log marker regex"));

/// What the log body links or embeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptContent {
    Hosted(HostedReceipt),
    /// Markdown rendering used when publishing the receipt failed.
    Inline(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct LogMarker {
    apparatus: String,
    timestamp: DateTime<Utc>,
    inspector: String,
    total_items: usize,
    issues_found: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    submission_id: Option<String>,
}

/// Title dated in the inspector's own offset.
#[must_use]
pub fn log_title(apparatus: &str, timestamp: &DateTime<FixedOffset>) -> String {
    format!("[{apparatus}] Daily Inspection - {}", timestamp.format("%Y-%m-%d"))
}

#[must_use]
pub fn log_labels(apparatus: &str) -> Vec<String> {
    vec![labels::LOG.to_string(), apparatus.to_string()]
}

#[must_use]
pub fn log_body(record: &LogRecord, receipt: &ReceiptContent, utc_offset: FixedOffset) -> String {
    let mut body = format!(
        "## Daily Inspection Log\n\n\
         **Apparatus:** {}\n\
         **Inspector:** {}\n\
         **Date:** {}\n\
         **Items checked:** {}\n\
         **Issues found:** {}\n\n\
         ### Defects\n",
        record.apparatus,
        record.inspector,
        record.timestamp.with_timezone(&utc_offset).format("%Y-%m-%d %H:%M %:z"),
        record.total_items,
        record.issues_found,
    );
    if record.defect_summary.is_empty() {
        body.push_str("No defects reported.\n");
    } else {
        for line in &record.defect_summary {
            body.push_str(&format!("- {line}\n"));
        }
    }

    body.push('\n');
    match receipt {
        ReceiptContent::Hosted(hosted) => {
            body.push_str(&format!("### Receipt\n[View inspection receipt]({})\n", hosted.url));
        }
        ReceiptContent::Inline(markdown) => body.push_str(markdown),
    }

    let marker = LogMarker {
        apparatus: record.apparatus.clone(),
        timestamp: record.timestamp,
        inspector: record.inspector.clone(),
        total_items: record.total_items,
        issues_found: record.issues_found,
        submission_id: record.submission_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&marker) {
        body.push_str(&format!("\n<!-- firecheck-log:{} -->\n", json.replace('>', "\\u003e")));
    }
    body
}

/// Read a log issue back. Falls back to the title and creation time when the
/// body carries no marker; issues matching neither are ignored.
#[must_use]
pub fn parse_log_issue(issue: &Issue) -> Option<LogRecord> {
    let receipt_url = receipt_link(&issue.body);
    let defect_summary = defect_lines(&issue.body);

    if let Some(marker) = LOG_MARKER_RE
        .captures(&issue.body)
        .and_then(|c| c.get(1))
        .and_then(|m| serde_json::from_str::<LogMarker>(m.as_str()).ok())
    {
        return Some(LogRecord {
            apparatus: marker.apparatus,
            timestamp: marker.timestamp,
            inspector: marker.inspector,
            total_items: marker.total_items,
            issues_found: marker.issues_found,
            defect_summary,
            receipt_url,
            submission_id: marker.submission_id,
            tracking_id: issue.number,
        });
    }

    let caps = LOG_TITLE_RE.captures(&issue.title)?;
    Some(LogRecord {
        apparatus: caps.get(1)?.as_str().to_string(),
        timestamp: issue.created_at,
        inspector: String::new(),
        total_items: 0,
        issues_found: defect_summary.len(),
        defect_summary,
        receipt_url,
        submission_id: None,
        tracking_id: issue.number,
    })
}

/// The log already written for `submission_id` on `apparatus`, if any.
///
/// Only logs updated at or after `since` are considered.
///
/// # Errors
///
/// Returns `StoreError` if the listing fails.
pub fn find_submission_log(
    store: &dyn IssueStore,
    apparatus: &str,
    submission_id: &str,
    since: DateTime<Utc>,
    page_size: u32,
) -> Result<Option<LogRecord>, StoreError> {
    let query = IssueQuery::open_with_labels(&[labels::LOG, apparatus])
        .with_state(StateFilter::All)
        .with_since(since)
        .with_per_page(page_size);
    Ok(store
        .list_issues(&query)?
        .iter()
        .filter_map(parse_log_issue)
        .find(|log| log.submission_id.as_deref() == Some(submission_id)))
}

fn receipt_link(body: &str) -> Option<String> {
    let start = body.find("[View inspection receipt](")? + "[View inspection receipt](".len();
    let end = body[start..].find(')')?;
    Some(body[start..start + end].to_string())
}

fn defect_lines(body: &str) -> Vec<String> {
    let Some(start) = body.find("### Defects\n") else {
        return Vec::new();
    };
    body[start + "### Defects\n".len()..]
        .lines()
        .take_while(|l| l.starts_with("- "))
        .map(|l| l[2..].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IssueState, MemoryIssueStore, NewIssue};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn record() -> LogRecord {
        LogRecord {
            apparatus: "Rescue 1".to_string(),
            timestamp: "2026-10-19T11:30:00Z".parse().unwrap(),
            inspector: "Lt. Dana Reyes".to_string(),
            total_items: 40,
            issues_found: 2,
            defect_summary: vec![
                "Cab: Flashlight - Missing".to_string(),
                "Cab: Radio - Damaged".to_string(),
            ],
            receipt_url: None,
            submission_id: Some("sub-1".to_string()),
            tracking_id: 0,
        }
    }

    fn issue(title: String, body: String) -> Issue {
        let at = "2026-10-19T12:00:00Z".parse().unwrap();
        Issue {
            number: 12,
            title,
            body,
            state: IssueState::Closed,
            labels: log_labels("Rescue 1"),
            created_at: at,
            updated_at: at,
            closed_at: Some(at),
            html_url: String::new(),
        }
    }

    #[test]
    fn test_hosted_receipt_round_trip() {
        let rec = record();
        let hosted = ReceiptContent::Hosted(HostedReceipt {
            id: "r1".to_string(),
            url: "https://receipts.example/r1".to_string(),
        });
        let title = log_title(&rec.apparatus, &rec.timestamp.fixed_offset());
        let parsed = parse_log_issue(&issue(title, log_body(&rec, &hosted, utc()))).unwrap();
        assert_eq!(parsed.receipt_url.as_deref(), Some("https://receipts.example/r1"));
        assert_eq!(parsed.defect_summary, rec.defect_summary);
        assert_eq!(parsed.total_items, 40);
        assert_eq!(parsed.tracking_id, 12);
    }

    #[test]
    fn test_inline_receipt_is_embedded() {
        let body = log_body(
            &record(),
            &ReceiptContent::Inline("### Inspection Receipt\n| a |\n".to_string()),
            utc(),
        );
        assert!(body.contains("### Inspection Receipt"));
        assert!(!body.contains("[View inspection receipt]"));
    }

    #[test]
    fn test_title_fallback() {
        let parsed = parse_log_issue(&issue(
            "[Engine 2] Daily Inspection - 2026-10-18".to_string(),
            "hand written".to_string(),
        ))
        .unwrap();
        assert_eq!(parsed.apparatus, "Engine 2");
        assert_eq!(parsed.timestamp.to_rfc3339(), "2026-10-19T12:00:00+00:00");
        assert!(parse_log_issue(&issue("Something else".to_string(), String::new())).is_none());
    }

    #[test]
    fn test_title_format() {
        let rec = record();
        assert_eq!(
            log_title(&rec.apparatus, &rec.timestamp.fixed_offset()),
            "[Rescue 1] Daily Inspection - 2026-10-19"
        );
    }

    #[test]
    fn test_late_evening_log_keeps_local_date() {
        let mut rec = record();
        rec.timestamp = "2026-10-20T01:30:00Z".parse().unwrap();
        let edt = FixedOffset::west_opt(4 * 3600).unwrap();

        let title = log_title(&rec.apparatus, &rec.timestamp.with_timezone(&edt));
        assert_eq!(title, "[Rescue 1] Daily Inspection - 2026-10-19");
        let body = log_body(&rec, &ReceiptContent::Inline(String::new()), edt);
        assert!(body.contains("**Date:** 2026-10-19 21:30 -04:00"));
        let parsed = parse_log_issue(&issue(title, body)).unwrap();
        assert_eq!(parsed.timestamp, rec.timestamp);
    }

    #[test]
    fn test_find_submission_log_matches_marker() {
        let store = MemoryIssueStore::new();
        let rec = record();
        let body = log_body(&rec, &ReceiptContent::Inline(String::new()), utc());
        let title = log_title(&rec.apparatus, &rec.timestamp.fixed_offset());
        let number = store
            .seed(
                NewIssue {
                    title,
                    body,
                    labels: log_labels(&rec.apparatus),
                },
                IssueState::Closed,
            )
            .number;
        let since = Utc::now() - chrono::Duration::days(1);

        let found = find_submission_log(&store, "Rescue 1", "sub-1", since, 100).unwrap().unwrap();
        assert_eq!(found.tracking_id, number);
        assert!(find_submission_log(&store, "Rescue 1", "sub-2", since, 100).unwrap().is_none());
        assert!(find_submission_log(&store, "Engine 1", "sub-1", since, 100).unwrap().is_none());
    }
}
