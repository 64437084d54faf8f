//! Domain types for TrustBridge
//!
//! Sessions (in-progress conversations) and reports (finalized issues).

mod phone;
mod report;
mod session;

pub use phone::normalize_phone;
pub use report::{MissingField, Report, ReportDraft, ReportStatus, report_reference};
pub use session::{ConversationState, EvidenceFile, HistoryEntry, ReportData, Session, Speaker};
