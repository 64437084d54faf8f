//! ReportStore - SQLite persistence for TrustBridge
//!
//! Holds the two tables the conversation engine needs: one row per
//! in-progress conversation (keyed by phone number) and one row per
//! finalized issue report.
//!
//! # Schema
//!
//! ```text
//! user_sessions(phone_number PK, state, report_data JSON, created_at, updated_at)
//! reports(id PK, phone_number, category, subcategory, description, location,
//!         evidence_files JSON, status, priority, created_at, updated_at)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use reportstore::{NewReport, Store};
//!
//! let store = Store::open("data/reports.db")?;
//! store.put_session("254712345678", "category", "{}")?;
//! let report = store.create_report(&new_report)?;
//! ```

mod store;

pub use store::{NewReport, ReportRecord, ReportStats, SessionRecord, Store, now_ms};

/// Status assigned to every freshly created report
pub const DEFAULT_STATUS: &str = "pending";

/// Priority assigned to every freshly created report
pub const DEFAULT_PRIORITY: &str = "medium";
