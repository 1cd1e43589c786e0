//! Index of open defects for one apparatus.

use std::collections::HashMap;

use crate::defects::format::parse_defect_issue;
use crate::model::labels;
use crate::model::{DefectKey, DefectRecord};
use crate::store::{IssueQuery, IssueStore, StoreError};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Open defects keyed by `compartment:item`.
#[derive(Debug, Clone, Default)]
pub struct DefectIndex {
    entries: HashMap<DefectKey, DefectRecord>,
    lookup_error: Option<String>,
}

impl DefectIndex {
    #[must_use]
    pub fn get(&self, key: &DefectKey) -> Option<&DefectRecord> {
        self.entries.get(key)
    }

    /// Record a defect written during the current reconciliation.
    pub fn insert(&mut self, record: DefectRecord) {
        self.entries.insert(record.key(), record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set when the store lookup failed and the index is empty as a result.
    #[must_use]
    pub fn lookup_error(&self) -> Option<&str> {
        self.lookup_error.as_deref()
    }
}

/// Build the index of open defects for `apparatus`.
///
/// Lists open issues labelled both `Defect` and the apparatus name. A failed
/// lookup never blocks a submission: it is logged and an empty index is
/// returned, so the worst case is a duplicate issue rather than a merged comment.
/// Issues that do not parse as defects are skipped. When two open issues share
/// a key the later one in the store's return order wins.
#[must_use]
pub fn build_index(store: &dyn IssueStore, apparatus: &str, page_size: u32) -> DefectIndex {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::build_index_span(apparatus).entered();

    let query = IssueQuery::open_with_labels(&[labels::DEFECT, apparatus]).with_per_page(page_size);
    let issues = match store.list_issues(&query) {
        Ok(issues) => issues,
        Err(e) => {
            log::warn!("existing-defect lookup for {apparatus} failed, treating as none open: {e}");
            return DefectIndex {
                entries: HashMap::new(),
                lookup_error: Some(e.to_string()),
            };
        }
    };

    let mut index = DefectIndex::default();
    for issue in &issues {
        match parse_defect_issue(issue) {
            Some(record) => index.insert(record),
            None => log::debug!("skipping issue #{} with unrecognised title", issue.number),
        }
    }
    log::debug!("{} open defect(s) indexed for {apparatus}", index.len());
    index
}

/// Open defects across every apparatus, in the store's return order.
///
/// Unlike [`build_index`] a failed listing is returned to the caller.
///
/// # Errors
///
/// Returns `StoreError` if the listing fails.
pub fn list_open_defects(store: &dyn IssueStore, page_size: u32) -> Result<Vec<DefectRecord>, StoreError> {
    let query = IssueQuery::open_with_labels(&[labels::DEFECT]).with_per_page(page_size);
    Ok(store
        .list_issues(&query)?
        .iter()
        .filter_map(parse_defect_issue)
        .collect())
}
