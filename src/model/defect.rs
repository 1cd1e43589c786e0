//! Defect records and the `compartment:item` identity key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reported condition of a defective item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefectStatus {
    #[serde(alias = "Missing")]
    Missing,
    #[serde(alias = "Damaged")]
    Damaged,
}

impl DefectStatus {
    /// Title-case wire form, as used in issue titles.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Missing => "Missing",
            Self::Damaged => "Damaged",
        }
    }

    /// Status glyph shown in issue bodies and receipts.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Missing => "❌",
            Self::Damaged => "⚠️",
        }
    }

    /// Parse the title-case form. Anything else is rejected.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Missing" => Some(Self::Missing),
            "Damaged" => Some(Self::Damaged),
            _ => None,
        }
    }
}

impl fmt::Display for DefectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a defect within one apparatus: `"{compartment}:{item}"`.
///
/// The key is case-sensitive and compared as an exact string. It does not embed
/// the apparatus; lookups are scoped to an apparatus by the issue query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefectKey(String);

impl DefectKey {
    /// Derive the key for a compartment/item pair.
    #[must_use]
    pub fn new(compartment: &str, item: &str) -> Self {
        Self(format!("{compartment}:{item}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DefectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A defect as tracked on the issue store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub apparatus: String,
    pub compartment: String,
    pub item: String,
    pub status: DefectStatus,
    pub notes: String,
    pub photo_url: Option<String>,
    pub reported_by: String,
    pub reported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Issue number on the tracker.
    pub tracking_id: u64,
    pub resolved: bool,
    /// Submission that created the issue, when known.
    pub submission_id: Option<String>,
}

impl DefectRecord {
    #[must_use]
    pub fn key(&self) -> DefectKey {
        DefectKey::new(&self.compartment, &self.item)
    }
}
