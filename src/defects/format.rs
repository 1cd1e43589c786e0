//! Rendering and parsing of defect issues.
//!
//! Titles follow `"[{apparatus}] {compartment}: {item} - {Missing|Damaged}"`.
//! Bodies end with a hidden marker carrying the same identity as JSON, which is
//! what [`parse_defect_issue`] reads first. The title grammar is only a fallback
//! for issues written before the marker existed.
//!
//! Compartment or item names that themselves contain `" - Missing"` or
//! `": "` can parse ambiguously from the title; such names are not rejected.

use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{DefectRecord, DefectStatus, Inspector, ReportedDefect};
use crate::model::labels;
use crate::store::{Issue, IssueState};

static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(.+?)\] (.+?): (.+) - (Missing|Damaged)$").expect("defect title regex")
});

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- firecheck:(\{.*?\}) -->").expect("defect marker regex"));

/// Structured identity persisted in every defect issue body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectMarker {
    pub apparatus: String,
    pub compartment: String,
    pub item: String,
    pub status: DefectStatus,
    #[serde(default)]
    pub reported_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl DefectMarker {
    #[must_use]
    pub fn render(&self) -> String {
        // A name containing "-->" must not close the HTML comment.
        let json = serde_json::to_string(self)
            .unwrap_or_default()
            .replace('>', "\\u003e");
        format!("<!-- firecheck:{json} -->")
    }

    #[must_use]
    pub fn extract(body: &str) -> Option<Self> {
        let caps = MARKER_RE.captures(body)?;
        serde_json::from_str(caps.get(1)?.as_str()).ok()
    }
}

/// Title fields recovered from the fallback grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTitle {
    pub apparatus: String,
    pub compartment: String,
    pub item: String,
    pub status: DefectStatus,
}

#[must_use]
pub fn defect_title(apparatus: &str, compartment: &str, item: &str, status: DefectStatus) -> String {
    format!("[{apparatus}] {compartment}: {item} - {status}")
}

/// Parse a title written by [`defect_title`]. Non-matching titles yield `None`.
#[must_use]
pub fn parse_defect_title(title: &str) -> Option<ParsedTitle> {
    let caps = TITLE_RE.captures(title)?;
    Some(ParsedTitle {
        apparatus: caps.get(1)?.as_str().to_string(),
        compartment: caps.get(2)?.as_str().to_string(),
        item: caps.get(3)?.as_str().to_string(),
        status: DefectStatus::parse(caps.get(4)?.as_str())?,
    })
}

/// Recover a [`DefectRecord`] from an issue: marker first, then title.
#[must_use]
pub fn parse_defect_issue(issue: &Issue) -> Option<DefectRecord> {
    let (apparatus, compartment, item, status, reported_by, submission_id) =
        match DefectMarker::extract(&issue.body) {
            Some(m) => (m.apparatus, m.compartment, m.item, m.status, m.reported_by, m.submission_id),
            None => {
                let t = parse_defect_title(&issue.title)?;
                (t.apparatus, t.compartment, t.item, t.status, String::new(), None)
            }
        };

    Some(DefectRecord {
        apparatus,
        compartment,
        item,
        status,
        notes: section(&issue.body, "### Notes").unwrap_or_default(),
        photo_url: photo_url(&issue.body),
        reported_by,
        reported_at: issue.created_at,
        updated_at: issue.updated_at,
        tracking_id: issue.number,
        resolved: issue.state == IssueState::Closed || issue.has_label(labels::RESOLVED),
        submission_id,
    })
}

/// Labels for a new defect issue.
#[must_use]
pub fn defect_labels(apparatus: &str, status: DefectStatus) -> Vec<String> {
    let mut out = vec![labels::DEFECT.to_string(), apparatus.to_string()];
    if status == DefectStatus::Damaged {
        out.push(labels::DAMAGED.to_string());
    }
    out
}

/// Markdown body for a new defect issue.
#[must_use]
pub fn defect_body(
    apparatus: &str,
    defect: &ReportedDefect,
    inspector: &Inspector,
    reported_at: &DateTime<FixedOffset>,
    submission_id: Option<&str>,
) -> String {
    let mut body = format!(
        "## Defect Report\n\n\
         **Apparatus:** {apparatus}\n\
         **Compartment:** {}\n\
         **Item:** {}\n\
         **Status:** {} {}\n\
         **Reported by:** {}\n\
         **Date:** {}\n",
        defect.compartment,
        defect.item,
        defect.status.glyph(),
        defect.status,
        inspector.display_name(),
        reported_at.format("%Y-%m-%d %H:%M %:z"),
    );

    if let Some(notes) = defect.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!("\n### Notes\n{}\n", notes.trim()));
    }
    if let Some(url) = defect.photo_url.as_deref() {
        body.push_str(&format!("\n### Photo\n![Defect photo]({url})\n"));
    }

    let marker = DefectMarker {
        apparatus: apparatus.to_string(),
        compartment: defect.compartment.clone(),
        item: defect.item.clone(),
        status: defect.status,
        reported_by: inspector.display_name(),
        submission_id: submission_id.map(str::to_string),
    };
    body.push('\n');
    body.push_str(&marker.render());
    body.push('\n');
    body
}

/// Comment recording that an open defect was seen again.
#[must_use]
pub fn verification_comment(
    defect: &ReportedDefect,
    inspector: &Inspector,
    verified_at: &DateTime<FixedOffset>,
) -> String {
    let mut body = format!(
        "### Verification\n\n\
         Defect still present: {} {}\n\n\
         **Verified by:** {}\n\
         **Date:** {}\n",
        defect.status.glyph(),
        defect.status,
        inspector.display_name(),
        verified_at.format("%Y-%m-%d %H:%M %:z"),
    );
    if let Some(notes) = defect.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!("**Notes:** {}\n", notes.trim()));
    }
    if let Some(url) = defect.photo_url.as_deref() {
        body.push_str(&format!("\n![Verification photo]({url})\n"));
    }
    body
}

/// Text under a `### Heading` up to the next heading or marker.
fn section(body: &str, heading: &str) -> Option<String> {
    let start = body.find(heading)? + heading.len();
    let rest = &body[start..];
    let end = [rest.find("\n### "), rest.find("<!--")]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());
    let text = rest[..end].trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn photo_url(body: &str) -> Option<String> {
    let start = body.find("![Defect photo](")? + "![Defect photo](".len();
    let end = body[start..].find(')')?;
    Some(body[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str, body: &str) -> Issue {
        let now = Utc::now();
        Issue {
            number: 7,
            title: title.to_string(),
            body: body.to_string(),
            state: IssueState::Open,
            labels: vec!["Defect".to_string(), "Rescue 1".to_string()],
            created_at: now,
            updated_at: now,
            closed_at: None,
            html_url: String::new(),
        }
    }

    fn inspector() -> Inspector {
        Inspector {
            name: "Dana Reyes".to_string(),
            rank: "Lt.".to_string(),
        }
    }

    #[test]
    fn test_title_round_trip() {
        let title = defect_title("Rescue 1", "Cab", "Flashlight", DefectStatus::Missing);
        assert_eq!(title, "[Rescue 1] Cab: Flashlight - Missing");
        let parsed = parse_defect_title(&title).unwrap();
        assert_eq!(parsed.apparatus, "Rescue 1");
        assert_eq!(parsed.compartment, "Cab");
        assert_eq!(parsed.item, "Flashlight");
        assert_eq!(parsed.status, DefectStatus::Missing);
    }

    #[test]
    fn test_item_names_with_separators() {
        let title = defect_title("Engine 2", "Compartment R1", "SCBA - Spare: Bottle", DefectStatus::Damaged);
        let parsed = parse_defect_title(&title).unwrap();
        assert_eq!(parsed.compartment, "Compartment R1");
        assert_eq!(parsed.item, "SCBA - Spare: Bottle");
    }

    #[test]
    fn test_non_matching_titles_are_skipped() {
        assert!(parse_defect_title("[Rescue 1] Daily Inspection - 2026-10-19").is_none());
        assert!(parse_defect_title("Cab: Radio - Missing").is_none());
        assert!(parse_defect_title("[Rescue 1] Cab: Radio - Lost").is_none());
    }

    #[test]
    fn test_marker_takes_precedence_over_title() {
        let defect = ReportedDefect {
            compartment: "Cab".to_string(),
            item: "Radio - Missing".to_string(),
            status: DefectStatus::Damaged,
            notes: Some("cracked antenna".to_string()),
            photo_url: Some("https://photos.example/1.jpg".to_string()),
        };
        let body = defect_body("Rescue 1", &defect, &inspector(), &Utc::now().fixed_offset(), Some("sub-1"));
        let record = parse_defect_issue(&issue("edited by hand", &body)).unwrap();
        assert_eq!(record.item, "Radio - Missing");
        assert_eq!(record.status, DefectStatus::Damaged);
        assert_eq!(record.notes, "cracked antenna");
        assert_eq!(record.photo_url.as_deref(), Some("https://photos.example/1.jpg"));
        assert_eq!(record.reported_by, "Lt. Dana Reyes");
        assert_eq!(record.submission_id.as_deref(), Some("sub-1"));
        assert_eq!(record.tracking_id, 7);
    }

    #[test]
    fn test_title_fallback_without_marker() {
        let record = parse_defect_issue(&issue("[Rescue 1] Cab: Radio - Damaged", "legacy body")).unwrap();
        assert_eq!(record.key().as_str(), "Cab:Radio");
        assert!(record.submission_id.is_none());
        assert!(!record.resolved);
    }

    #[test]
    fn test_labels_include_damaged_only_for_damaged() {
        assert_eq!(defect_labels("Rescue 1", DefectStatus::Missing), vec!["Defect", "Rescue 1"]);
        assert_eq!(
            defect_labels("Rescue 1", DefectStatus::Damaged),
            vec!["Defect", "Rescue 1", "Damaged"]
        );
    }

    #[test]
    fn test_marker_escapes_comment_terminator() {
        let marker = DefectMarker {
            apparatus: "A".to_string(),
            compartment: "x-->".to_string(),
            item: "y".to_string(),
            status: DefectStatus::Missing,
            reported_by: String::new(),
            submission_id: None,
        };
        let rendered = marker.render();
        assert_eq!(rendered.matches("-->").count(), 1);
        assert_eq!(DefectMarker::extract(&rendered).unwrap(), marker);
    }

    #[test]
    fn test_dates_keep_the_inspector_offset() {
        let at = DateTime::parse_from_rfc3339("2026-10-19T21:30:00-04:00").unwrap();
        let defect = ReportedDefect {
            compartment: "Cab".to_string(),
            item: "Radio".to_string(),
            status: DefectStatus::Damaged,
            notes: Some("antenna cracked".to_string()),
            photo_url: None,
        };
        let body = defect_body("Rescue 1", &defect, &inspector(), &at, None);
        assert!(body.contains("**Date:** 2026-10-19 21:30 -04:00"));

        let comment = verification_comment(&defect, &inspector(), &at);
        assert!(comment.contains("**Date:** 2026-10-19 21:30 -04:00"));
        assert!(comment.contains("**Notes:** antenna cracked"));
        assert!(!comment.contains("<!--"));
    }
}
