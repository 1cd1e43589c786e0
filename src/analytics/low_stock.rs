//! Items repeatedly reported missing across the fleet.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::analytics::compliance::ANALYSIS_WINDOW_DAYS;
use crate::model::{DefectKey, DefectRecord, DefectStatus};

/// Reports needed before an item counts as low stock.
pub const LOW_STOCK_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub key: DefectKey,
    pub compartment: String,
    pub item: String,
    pub occurrences: usize,
    /// Apparatus that reported it, in first-seen order.
    pub apparatus: Vec<String>,
}

/// Items reported missing at least twice in the 30 days ending at `now`,
/// grouped by `compartment:item` and sorted by occurrences (descending), then key.
#[must_use]
pub fn low_stock_items(defects: &[DefectRecord], now: DateTime<Utc>) -> Vec<LowStockItem> {
    let window_start = now - Duration::days(ANALYSIS_WINDOW_DAYS);
    let mut grouped: HashMap<DefectKey, LowStockItem> = HashMap::new();

    for defect in defects
        .iter()
        .filter(|d| d.status == DefectStatus::Missing)
        .filter(|d| d.reported_at >= window_start && d.reported_at <= now)
    {
        let entry = grouped.entry(defect.key()).or_insert_with(|| LowStockItem {
            key: defect.key(),
            compartment: defect.compartment.clone(),
            item: defect.item.clone(),
            occurrences: 0,
            apparatus: Vec::new(),
        });
        entry.occurrences += 1;
        if !entry.apparatus.contains(&defect.apparatus) {
            entry.apparatus.push(defect.apparatus.clone());
        }
    }

    let mut items: Vec<LowStockItem> = grouped
        .into_values()
        .filter(|i| i.occurrences >= LOW_STOCK_THRESHOLD)
        .collect();
    items.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.key.cmp(&b.key)));
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defect(apparatus: &str, item: &str, status: DefectStatus, days_ago: i64, now: DateTime<Utc>) -> DefectRecord {
        let at = now - Duration::days(days_ago);
        DefectRecord {
            apparatus: apparatus.to_string(),
            compartment: "Cab".to_string(),
            item: item.to_string(),
            status,
            notes: String::new(),
            photo_url: None,
            reported_by: String::new(),
            reported_at: at,
            updated_at: at,
            tracking_id: 1,
            resolved: true,
            submission_id: None,
        }
    }

    #[test]
    fn test_threshold_is_two() {
        let now = Utc::now();
        let defects = vec![
            defect("Engine 1", "Flashlight", DefectStatus::Missing, 3, now),
            defect("Rescue 1", "Flashlight", DefectStatus::Missing, 10, now),
            defect("Rescue 1", "Radio", DefectStatus::Missing, 1, now),
        ];
        let items = low_stock_items(&defects, now);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key.as_str(), "Cab:Flashlight");
        assert_eq!(items[0].occurrences, 2);
        assert_eq!(items[0].apparatus, vec!["Engine 1", "Rescue 1"]);
    }

    #[test]
    fn test_ignores_damaged_and_old_reports() {
        let now = Utc::now();
        let defects = vec![
            defect("Engine 1", "Axe", DefectStatus::Damaged, 1, now),
            defect("Engine 2", "Axe", DefectStatus::Damaged, 2, now),
            defect("Engine 1", "Hose", DefectStatus::Missing, 45, now),
            defect("Engine 2", "Hose", DefectStatus::Missing, 2, now),
        ];
        assert!(low_stock_items(&defects, now).is_empty());
    }

    #[test]
    fn test_sorted_by_count_then_key() {
        let now = Utc::now();
        let mut defects = Vec::new();
        for a in ["Engine 1", "Engine 2", "Rescue 1"] {
            defects.push(defect(a, "Gloves", DefectStatus::Missing, 1, now));
        }
        for a in ["Engine 1", "Engine 2"] {
            defects.push(defect(a, "Batteries", DefectStatus::Missing, 1, now));
            defects.push(defect(a, "Axe", DefectStatus::Missing, 1, now));
        }
        let keys: Vec<String> = low_stock_items(&defects, now)
            .into_iter()
            .map(|i| format!("{}={}", i.key, i.occurrences))
            .collect();
        assert_eq!(keys, vec!["Cab:Gloves=3", "Cab:Axe=2", "Cab:Batteries=2"]);
    }
}
