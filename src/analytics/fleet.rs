//! Open-defect counts per apparatus.

use serde::Serialize;
use std::collections::HashMap;

use crate::model::DefectRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetEntry {
    pub apparatus: String,
    pub open_defects: usize,
}

/// Per-apparatus open-defect counts, in the order the apparatus list was given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FleetStatus {
    entries: Vec<FleetEntry>,
}

impl FleetStatus {
    #[must_use]
    pub fn get(&self, apparatus: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.apparatus == apparatus)
            .map(|e| e.open_defects)
    }

    #[must_use]
    pub fn entries(&self) -> &[FleetEntry] {
        &self.entries
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.open_defects).sum()
    }
}

/// Count open defects per apparatus in a single pass.
///
/// Every apparatus in `apparatus` starts at zero. A defect whose apparatus is
/// not listed gets its own entry after the listed ones, so the total always
/// equals the number of defects given.
#[must_use]
pub fn compute_fleet_status(apparatus: &[String], open_defects: &[DefectRecord]) -> FleetStatus {
    let mut entries: Vec<FleetEntry> = apparatus
        .iter()
        .map(|a| FleetEntry {
            apparatus: a.clone(),
            open_defects: 0,
        })
        .collect();

    let mut positions: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.apparatus.clone(), i))
        .collect();

    for defect in open_defects {
        match positions.get(&defect.apparatus) {
            Some(&i) => entries[i].open_defects += 1,
            None => {
                positions.insert(defect.apparatus.clone(), entries.len());
                entries.push(FleetEntry {
                    apparatus: defect.apparatus.clone(),
                    open_defects: 1,
                });
            }
        }
    }

    FleetStatus { entries }
}
