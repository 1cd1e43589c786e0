//! # Firecheck
//!
//! Daily apparatus inspections tracked on an issue tracker.
//!
//! An inspector submits a checklist for one apparatus. Every reported defect is
//! matched against the open defect issues for that apparatus: a known defect
//! gets a verification comment, a new one gets its own issue. Only when every
//! defect write succeeded is a closed log issue written for the inspection,
//! with a hosted receipt link or an inline receipt.
//!
//! - [`submission`]: reconcile and log-gated commit
//! - [`store`]: the issue tracker seam ([`store::IssueStore`]) with GitHub and in-memory backends
//! - [`analytics`]: fleet status, submission compliance and low-stock reports
//! - [`admin`]: session-scoped admin operations

pub mod admin;
pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod defects;
pub mod insights;
pub mod logbook;
pub mod metrics;
pub mod model;
pub mod receipt;
pub mod store;
pub mod submission;
pub mod supply;

pub use admin::{AdminConsole, AdminError, AdminGate, AdminSession};
pub use config::FirecheckConfig;
pub use model::{DefectKey, DefectRecord, DefectStatus, InspectionSubmission, LogRecord, SubmitRequest};
pub use store::{GitHubIssueStore, IssueStore, MemoryIssueStore, StoreError};
pub use submission::{SubmissionAccepted, SubmissionError, SubmissionService};
