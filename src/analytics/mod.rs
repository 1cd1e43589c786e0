//! Pure aggregations over already-fetched defect and log records.

pub mod compliance;
pub mod fleet;
pub mod low_stock;

pub use compliance::{
    submission_report, submitted_today, ApparatusCompliance, SubmissionReport,
    ANALYSIS_WINDOW_DAYS,
};
pub use fleet::{compute_fleet_status, FleetEntry, FleetStatus};
pub use low_stock::{low_stock_items, LowStockItem, LOW_STOCK_THRESHOLD};
