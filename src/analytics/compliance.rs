//! Daily-submission compliance over inspection logs.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;

use crate::model::LogRecord;

/// Window used for submission totals and low-stock analysis.
pub const ANALYSIS_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApparatusCompliance {
    pub apparatus: String,
    pub submitted_today: bool,
    /// Submissions in the last 30 days.
    pub total_submissions: usize,
    /// Local date of the most recent submission in the window.
    pub last_submission: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub today: NaiveDate,
    pub apparatus: Vec<ApparatusCompliance>,
}

impl SubmissionReport {
    /// Apparatus with no submission today, in fleet order.
    #[must_use]
    pub fn stale(&self) -> Vec<&str> {
        self.apparatus
            .iter()
            .filter(|a| !a.submitted_today)
            .map(|a| a.apparatus.as_str())
            .collect()
    }
}

fn local_date(at: &DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    at.with_timezone(offset).date_naive()
}

/// Apparatus that submitted on `now`'s local date, deduplicated, in first-seen order.
#[must_use]
pub fn submitted_today(logs: &[LogRecord], now: DateTime<Utc>, offset: FixedOffset) -> Vec<String> {
    let today = local_date(&now, &offset);
    let mut seen: Vec<String> = Vec::new();
    for log in logs {
        if local_date(&log.timestamp, &offset) == today && !seen.contains(&log.apparatus) {
            seen.push(log.apparatus.clone());
        }
    }
    seen
}

/// Per-apparatus submission report for the 30 days ending at `now`.
///
/// Only apparatus in `fleet` are reported. Logs outside the window or in the
/// future are ignored.
#[must_use]
pub fn submission_report(
    fleet: &[String],
    logs: &[LogRecord],
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> SubmissionReport {
    let today = local_date(&now, &offset);
    let window_start = now - Duration::days(ANALYSIS_WINDOW_DAYS);

    let apparatus = fleet
        .iter()
        .map(|name| {
            let in_window: Vec<&LogRecord> = logs
                .iter()
                .filter(|l| &l.apparatus == name)
                .filter(|l| l.timestamp >= window_start && l.timestamp <= now)
                .collect();
            let last_submission = in_window
                .iter()
                .map(|l| local_date(&l.timestamp, &offset))
                .max();
            ApparatusCompliance {
                apparatus: name.clone(),
                submitted_today: last_submission == Some(today),
                total_submissions: in_window.len(),
                last_submission,
            }
        })
        .collect();

    SubmissionReport { today, apparatus }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(apparatus: &str, at: &str) -> LogRecord {
        LogRecord {
            apparatus: apparatus.to_string(),
            timestamp: at.parse().unwrap(),
            inspector: String::new(),
            total_items: 0,
            issues_found: 0,
            defect_summary: vec![],
            receipt_url: None,
            submission_id: None,
            tracking_id: 0,
        }
    }

    fn eastern() -> FixedOffset {
        FixedOffset::west_opt(4 * 3600).unwrap()
    }

    #[test]
    fn test_today_uses_local_date() {
        let now: DateTime<Utc> = "2026-10-19T15:00:00Z".parse().unwrap();
        let logs = vec![
            // 2026-10-19 01:00 UTC is still the 18th in UTC-4.
            log("Engine 1", "2026-10-19T01:00:00Z"),
            log("Rescue 1", "2026-10-19T12:00:00Z"),
            log("Rescue 1", "2026-10-19T13:00:00Z"),
        ];
        assert_eq!(submitted_today(&logs, now, eastern()), vec!["Rescue 1".to_string()]);
    }

    #[test]
    fn test_report_totals_and_last_date() {
        let now: DateTime<Utc> = "2026-10-19T15:00:00Z".parse().unwrap();
        let fleet = vec!["Engine 1".to_string(), "Rescue 1".to_string(), "Ladder 3".to_string()];
        let logs = vec![
            log("Engine 1", "2026-10-10T12:00:00Z"),
            log("Engine 1", "2026-10-15T12:00:00Z"),
            log("Engine 1", "2026-08-01T12:00:00Z"),
            log("Rescue 1", "2026-10-19T12:00:00Z"),
        ];
        let report = submission_report(&fleet, &logs, now, eastern());
        assert_eq!(report.apparatus[0].total_submissions, 2);
        assert_eq!(
            report.apparatus[0].last_submission,
            NaiveDate::from_ymd_opt(2026, 10, 15)
        );
        assert!(report.apparatus[1].submitted_today);
        assert_eq!(report.apparatus[2].last_submission, None);
        assert_eq!(report.stale(), vec!["Engine 1", "Ladder 3"]);
    }
}
