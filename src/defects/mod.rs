//! Defect identity, issue formatting and the open-defect index.

pub mod format;
pub mod index;

pub use format::{
    defect_body, defect_labels, defect_title, parse_defect_issue, parse_defect_title,
    verification_comment, DefectMarker, ParsedTitle,
};
pub use index::{build_index, list_open_defects, DefectIndex};
