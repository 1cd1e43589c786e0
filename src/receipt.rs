//! Inspection receipts.
//!
//! A receipt summarises one inspection: inspector, apparatus, date, an item
//! table and summary counts. It is published to a [`ReceiptStore`] as a hosted
//! HTML document; when that fails the same content is rendered as markdown and
//! embedded directly in the log issue.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;

use crate::model::{InspectionSubmission, ItemStatus};
use crate::store::StoreError;

/// One row of the receipt item table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub compartment: String,
    pub item: String,
    pub status: ItemStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub total: usize,
    pub present: usize,
    pub missing: usize,
    pub damaged: usize,
}

/// Structured payload of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    pub apparatus: String,
    pub inspector: String,
    /// In the inspector's own offset.
    pub inspected_at: DateTime<FixedOffset>,
    pub submission_id: String,
    pub rows: Vec<ReceiptRow>,
    pub summary: ReceiptSummary,
}

impl ReceiptDocument {
    /// Build a receipt from a submission. Without a checklist, the reported
    /// defects alone make up the table.
    #[must_use]
    pub fn from_submission(submission: &InspectionSubmission) -> Self {
        let rows: Vec<ReceiptRow> = if submission.items.is_empty() {
            submission
                .defects
                .iter()
                .map(|d| ReceiptRow {
                    compartment: d.compartment.clone(),
                    item: d.item.clone(),
                    status: match d.status {
                        crate::model::DefectStatus::Missing => ItemStatus::Missing,
                        crate::model::DefectStatus::Damaged => ItemStatus::Damaged,
                    },
                    notes: d.notes.clone(),
                })
                .collect()
        } else {
            submission
                .items
                .iter()
                .map(|i| ReceiptRow {
                    compartment: i.compartment.clone(),
                    item: i.item.clone(),
                    status: i.status,
                    notes: i.notes.clone(),
                })
                .collect()
        };

        let mut summary = ReceiptSummary {
            total: rows.len(),
            ..ReceiptSummary::default()
        };
        for row in &rows {
            match row.status {
                ItemStatus::Present => summary.present += 1,
                ItemStatus::Missing => summary.missing += 1,
                ItemStatus::Damaged => summary.damaged += 1,
            }
        }

        Self {
            apparatus: submission.apparatus.clone(),
            inspector: submission.inspector.display_name(),
            inspected_at: submission.local_timestamp(),
            submission_id: submission.id.to_string(),
            rows,
            summary,
        }
    }
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Present => "✅ Present",
        ItemStatus::Missing => "❌ Missing",
        ItemStatus::Damaged => "⚠️ Damaged",
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Standalone HTML page for the hosted receipt.
#[must_use]
pub fn render_html(doc: &ReceiptDocument) -> String {
    let mut rows = String::new();
    for row in &doc.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&row.compartment),
            escape_html(&row.item),
            status_label(row.status),
            escape_html(row.notes.as_deref().unwrap_or("")),
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Inspection Receipt - {apparatus}</title>\n</head>\n<body>\n\
         <h1>Inspection Receipt</h1>\n\
         <p><strong>Apparatus:</strong> {apparatus}<br>\n\
         <strong>Inspector:</strong> {inspector}<br>\n\
         <strong>Date:</strong> {date}<br>\n\
         <strong>Reference:</strong> {reference}</p>\n\
         <table>\n<thead><tr><th>Compartment</th><th>Item</th><th>Status</th><th>Notes</th></tr></thead>\n\
         <tbody>\n{rows}</tbody>\n</table>\n\
         <p><strong>Summary:</strong> {total} items checked, {present} present, {missing} missing, {damaged} damaged</p>\n\
         </body>\n</html>\n",
        apparatus = escape_html(&doc.apparatus),
        inspector = escape_html(&doc.inspector),
        date = doc.inspected_at.format("%Y-%m-%d %H:%M %:z"),
        reference = escape_html(&doc.submission_id),
        total = doc.summary.total,
        present = doc.summary.present,
        missing = doc.summary.missing,
        damaged = doc.summary.damaged,
    )
}

/// Markdown rendering of the same content, for inline embedding.
#[must_use]
pub fn render_markdown(doc: &ReceiptDocument) -> String {
    let mut out = format!(
        "### Inspection Receipt\n\n\
         **Apparatus:** {}\n\
         **Inspector:** {}\n\
         **Date:** {}\n\n\
         | Compartment | Item | Status | Notes |\n\
         |---|---|---|---|\n",
        doc.apparatus,
        doc.inspector,
        doc.inspected_at.format("%Y-%m-%d %H:%M %:z"),
    );
    for row in &doc.rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&row.compartment),
            escape_cell(&row.item),
            status_label(row.status),
            escape_cell(row.notes.as_deref().unwrap_or("")),
        ));
    }
    out.push_str(&format!(
        "\n**Summary:** {} items checked, {} present, {} missing, {} damaged\n",
        doc.summary.total, doc.summary.present, doc.summary.missing, doc.summary.damaged
    ));
    out
}

/// A published receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedReceipt {
    pub id: String,
    pub url: String,
}

/// Hosted document store for receipts.
pub trait ReceiptStore: Send + Sync {
    /// Publish a receipt and return where it can be viewed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the document could not be stored.
    fn create(&self, document: &ReceiptDocument) -> Result<HostedReceipt, StoreError>;

    /// Fetch a previously published receipt.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown id.
    fn get(&self, id: &str) -> Result<ReceiptDocument, StoreError>;
}

/// Receipt store behind a small JSON API:
/// `POST {base}/receipts` returns `{id, url}`, `GET {base}/receipts/{id}` returns the document.
pub struct HttpReceiptStore {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpReceiptStore {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .build(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Serialize)]
struct CreateReceiptPayload<'a> {
    document: &'a ReceiptDocument,
    html: String,
}

impl ReceiptStore for HttpReceiptStore {
    fn create(&self, document: &ReceiptDocument) -> Result<HostedReceipt, StoreError> {
        let payload = CreateReceiptPayload {
            document,
            html: render_html(document),
        };
        let hosted: HostedReceipt = self
            .agent
            .post(&format!("{}/receipts", self.base_url))
            .send_json(&payload)?
            .into_json()?;
        Ok(hosted)
    }

    fn get(&self, id: &str) -> Result<ReceiptDocument, StoreError> {
        let response = self
            .agent
            .get(&format!("{}/receipts/{id}", self.base_url))
            .call()
            .map_err(|e| match StoreError::from(e) {
                StoreError::Api { status: 404, .. } => StoreError::NotFound(format!("receipt {id}")),
                other => other,
            })?;
        Ok(response.into_json()?)
    }
}

/// In-memory receipt store.
#[derive(Default)]
pub struct MemoryReceiptStore {
    documents: Mutex<Vec<(String, ReceiptDocument)>>,
    fail: Mutex<bool>,
}

impl MemoryReceiptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `create` fail.
    pub fn fail_creates(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReceiptStore for MemoryReceiptStore {
    fn create(&self, document: &ReceiptDocument) -> Result<HostedReceipt, StoreError> {
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(StoreError::Injected("receipt create".to_string()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.documents
            .lock()
            .map_err(|e| StoreError::Transport(format!("receipt store lock poisoned: {e}")))?
            .push((id.clone(), document.clone()));
        Ok(HostedReceipt {
            url: format!("memory://receipts/{id}"),
            id,
        })
    }

    fn get(&self, id: &str) -> Result<ReceiptDocument, StoreError> {
        self.documents
            .lock()
            .map_err(|e| StoreError::Transport(format!("receipt store lock poisoned: {e}")))?
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, doc)| doc.clone())
            .ok_or_else(|| StoreError::NotFound(format!("receipt {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChecklistItem, Inspector, SubmissionId};

    fn submission() -> InspectionSubmission {
        let item = |compartment: &str, item: &str, status| ChecklistItem {
            compartment: compartment.to_string(),
            item: item.to_string(),
            status,
            notes: None,
        };
        InspectionSubmission {
            id: SubmissionId::new("sub-1"),
            inspector: Inspector {
                name: "Dana Reyes".to_string(),
                rank: "Lt.".to_string(),
            },
            apparatus: "Rescue 1".to_string(),
            timestamp: "2026-10-19T11:30:00Z".parse().unwrap(),
            utc_offset: chrono::FixedOffset::east_opt(0).unwrap(),
            items: vec![
                item("Cab", "Flashlight", ItemStatus::Missing),
                item("Cab", "Radio", ItemStatus::Damaged),
                item("Cab", "Map Book", ItemStatus::Present),
                item("Rear <Bay>", "Cones", ItemStatus::Present),
            ],
            defects: vec![],
        }
    }

    #[test]
    fn test_summary_counts() {
        let doc = ReceiptDocument::from_submission(&submission());
        assert_eq!(
            doc.summary,
            ReceiptSummary {
                total: 4,
                present: 2,
                missing: 1,
                damaged: 1
            }
        );
        assert_eq!(doc.inspector, "Lt. Dana Reyes");
    }

    #[test]
    fn test_html_escapes_content() {
        let html = render_html(&ReceiptDocument::from_submission(&submission()));
        assert!(html.contains("Rear &lt;Bay&gt;"));
        assert!(!html.contains("<Bay>"));
        assert!(html.contains("4 items checked, 2 present, 1 missing, 1 damaged"));
    }

    #[test]
    fn test_markdown_has_table_and_summary() {
        let md = render_markdown(&ReceiptDocument::from_submission(&submission()));
        assert!(md.contains("| Cab | Flashlight | ❌ Missing |  |"));
        assert!(md.contains("**Summary:** 4 items checked"));
    }

    #[test]
    fn test_memory_store_round_trip_and_failure() {
        let store = MemoryReceiptStore::new();
        let doc = ReceiptDocument::from_submission(&submission());
        let hosted = store.create(&doc).unwrap();
        assert!(hosted.url.ends_with(&hosted.id));
        assert_eq!(store.get(&hosted.id).unwrap(), doc);
        assert!(matches!(store.get("nope"), Err(StoreError::NotFound(_))));

        store.fail_creates(true);
        assert!(store.create(&doc).is_err());
        assert_eq!(store.len(), 1);
    }
}
