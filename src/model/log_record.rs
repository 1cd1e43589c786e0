//! Inspection log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one accepted inspection. Written once, closed on creation and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub apparatus: String,
    pub timestamp: DateTime<Utc>,
    pub inspector: String,
    pub total_items: usize,
    pub issues_found: usize,
    pub defect_summary: Vec<String>,
    pub receipt_url: Option<String>,
    pub submission_id: Option<String>,
    /// Issue number on the tracker; zero until written.
    #[serde(default)]
    pub tracking_id: u64,
}
