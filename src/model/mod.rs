//! Domain records for apparatus inspections.
//!
//! - [`defect`]: reported defects and their identity key
//! - [`inspection`]: the ephemeral submission accepted from an inspector
//! - [`log_record`]: the closed log entry written once per accepted submission

pub mod defect;
pub mod inspection;
pub mod log_record;

pub use defect::{DefectKey, DefectRecord, DefectStatus};
pub use inspection::{
    ChecklistItem, InspectionSubmission, Inspector, ItemStatus, ReportedDefect, SubmissionId,
    SubmitRequest,
};
pub use log_record::LogRecord;

/// Fixed label names used on the issue tracker.
pub mod labels {
    /// Every defect issue carries this label.
    pub const DEFECT: &str = "Defect";
    /// Every inspection log issue carries this label.
    pub const LOG: &str = "Log";
    /// Added to defect issues whose status is damaged.
    pub const DAMAGED: &str = "Damaged";
    /// Added when an admin resolves a defect.
    pub const RESOLVED: &str = "Resolved";
}
