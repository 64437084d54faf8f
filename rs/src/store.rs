//! Core Store implementation

use std::collections::BTreeMap;
use std::path::Path;

use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DEFAULT_PRIORITY, DEFAULT_STATUS};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_sessions (
    phone_number TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    report_data TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number TEXT NOT NULL,
    category TEXT NOT NULL,
    subcategory TEXT,
    description TEXT NOT NULL,
    location TEXT NOT NULL,
    evidence_files TEXT NOT NULL DEFAULT '[]',
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_phone ON reports(phone_number, created_at DESC);
"#;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A persisted conversation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub phone_number: String,
    pub state: String,
    /// Serialized report data (JSON object)
    pub report_data: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields required to create a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub phone_number: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub location: String,
    /// Serialized evidence list (JSON array)
    pub evidence_files: String,
}

/// A persisted report row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: i64,
    pub phone_number: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub location: String,
    pub evidence_files: String,
    pub status: String,
    pub priority: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ReportRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            phone_number: row.get("phone_number")?,
            category: row.get("category")?,
            subcategory: row.get("subcategory")?,
            description: row.get("description")?,
            location: row.get("location")?,
            evidence_files: row.get("evidence_files")?,
            status: row.get("status")?,
            priority: row.get("priority")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Aggregate counts over all reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
}

/// SQLite-backed store for sessions and reports
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Store::open: called");

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "Opened report store");
        Ok(store)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        debug!("Store::open_in_memory: called");
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn })
    }

    // === Sessions ===

    /// Fetch the session row for a phone number
    pub fn get_session(&self, phone_number: &str) -> Result<Option<SessionRecord>> {
        debug!(%phone_number, "Store::get_session: called");
        self.conn
            .query_row(
                "SELECT phone_number, state, report_data, created_at, updated_at
                 FROM user_sessions WHERE phone_number = ?1",
                params![phone_number],
                |row| {
                    Ok(SessionRecord {
                        phone_number: row.get(0)?,
                        state: row.get(1)?,
                        report_data: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("Failed to read session")
    }

    /// Insert or replace the session row, keeping the original creation time
    pub fn put_session(&self, phone_number: &str, state: &str, report_data: &str) -> Result<()> {
        debug!(%phone_number, %state, "Store::put_session: called");
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO user_sessions (phone_number, state, report_data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(phone_number) DO UPDATE SET
                     state = excluded.state,
                     report_data = excluded.report_data,
                     updated_at = excluded.updated_at",
                params![phone_number, state, report_data, now],
            )
            .context("Failed to write session")?;
        Ok(())
    }

    /// Remove the session row; returns the number of rows deleted
    pub fn delete_session(&self, phone_number: &str) -> Result<usize> {
        debug!(%phone_number, "Store::delete_session: called");
        self.conn
            .execute("DELETE FROM user_sessions WHERE phone_number = ?1", params![phone_number])
            .context("Failed to delete session")
    }

    // === Reports ===

    /// Insert a new report with default status and priority
    pub fn create_report(&self, report: &NewReport) -> Result<ReportRecord> {
        debug!(phone_number = %report.phone_number, category = %report.category, "Store::create_report: called");
        let now = now_ms();
        self.conn
            .execute(
                "INSERT INTO reports (phone_number, category, subcategory, description, location,
                                      evidence_files, status, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    report.phone_number,
                    report.category,
                    report.subcategory,
                    report.description,
                    report.location,
                    report.evidence_files,
                    DEFAULT_STATUS,
                    DEFAULT_PRIORITY,
                    now,
                ],
            )
            .context("Failed to insert report")?;

        let id = self.conn.last_insert_rowid();
        info!(id, category = %report.category, "Report created");

        Ok(ReportRecord {
            id,
            phone_number: report.phone_number.clone(),
            category: report.category.clone(),
            subcategory: report.subcategory.clone(),
            description: report.description.clone(),
            location: report.location.clone(),
            evidence_files: report.evidence_files.clone(),
            status: DEFAULT_STATUS.to_string(),
            priority: DEFAULT_PRIORITY.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch one report by id
    pub fn get_report(&self, id: i64) -> Result<Option<ReportRecord>> {
        debug!(id, "Store::get_report: called");
        self.conn
            .query_row("SELECT * FROM reports WHERE id = ?1", params![id], ReportRecord::from_row)
            .optional()
            .context("Failed to read report")
    }

    /// Reports filed by one phone number, newest first
    pub fn reports_by_phone(&self, phone_number: &str) -> Result<Vec<ReportRecord>> {
        debug!(%phone_number, "Store::reports_by_phone: called");
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM reports WHERE phone_number = ?1 ORDER BY created_at DESC, id DESC")?;
        let rows = stmt
            .query_map(params![phone_number], ReportRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list reports")?;
        Ok(rows)
    }

    /// All reports, newest first
    pub fn list_reports(&self) -> Result<Vec<ReportRecord>> {
        debug!("Store::list_reports: called");
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM reports ORDER BY created_at DESC, id DESC")?;
        let rows = stmt
            .query_map([], ReportRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list reports")?;
        Ok(rows)
    }

    /// Set a report's status; returns the number of rows changed
    pub fn update_status(&self, id: i64, status: &str) -> Result<usize> {
        debug!(id, %status, "Store::update_status: called");
        self.conn
            .execute(
                "UPDATE reports SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now_ms(), id],
            )
            .context("Failed to update report status")
    }

    /// Totals by status and category
    pub fn stats(&self) -> Result<ReportStats> {
        debug!("Store::stats: called");
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;

        let mut stats = ReportStats {
            total: total as u64,
            ..Default::default()
        };

        for (column, target) in [("status", &mut stats.by_status), ("category", &mut stats.by_category)] {
            let sql = format!("SELECT {column}, COUNT(*) FROM reports GROUP BY {column}");
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (key, count) = row?;
                target.insert(key, count as u64);
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_report(phone: &str, category: &str) -> NewReport {
        NewReport {
            phone_number: phone.to_string(),
            category: category.to_string(),
            subcategory: Some("Roads".to_string()),
            description: "Large pothole near the market".to_string(),
            location: "Nairobi CBD".to_string(),
            evidence_files: "[]".to_string(),
        }
    }

    #[test]
    fn test_session_roundtrip_and_clear() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_session("254700000001").unwrap().is_none());

        store.put_session("254700000001", "category", "{}").unwrap();
        let first = store.get_session("254700000001").unwrap().unwrap();
        assert_eq!(first.state, "category");

        store
            .put_session("254700000001", "description", r#"{"category":"Healthcare"}"#)
            .unwrap();
        let second = store.get_session("254700000001").unwrap().unwrap();
        assert_eq!(second.state, "description");
        assert_eq!(second.created_at, first.created_at);
        assert!(second.report_data.contains("Healthcare"));

        assert_eq!(store.delete_session("254700000001").unwrap(), 1);
        assert!(store.get_session("254700000001").unwrap().is_none());
        assert_eq!(store.delete_session("254700000001").unwrap(), 0);
    }

    #[test]
    fn test_create_report_defaults() {
        let store = Store::open_in_memory().unwrap();
        let report = store.create_report(&new_report("254700000001", "Infrastructure")).unwrap();
        assert!(report.id > 0);
        assert_eq!(report.status, "pending");
        assert_eq!(report.priority, "medium");

        let loaded = store.get_report(report.id).unwrap().unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn test_reports_by_phone_filters_owner() {
        let store = Store::open_in_memory().unwrap();
        store.create_report(&new_report("254700000001", "Infrastructure")).unwrap();
        store.create_report(&new_report("254700000001", "Healthcare")).unwrap();
        store.create_report(&new_report("254700000002", "Security")).unwrap();

        let mine = store.reports_by_phone("254700000001").unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first
        assert_eq!(mine[0].category, "Healthcare");
        assert_eq!(store.list_reports().unwrap().len(), 3);
    }

    #[test]
    fn test_update_status_counts_rows() {
        let store = Store::open_in_memory().unwrap();
        let report = store.create_report(&new_report("254700000001", "Education")).unwrap();

        assert_eq!(store.update_status(report.id, "resolved").unwrap(), 1);
        assert_eq!(store.update_status(9999, "resolved").unwrap(), 0);
        assert_eq!(store.get_report(report.id).unwrap().unwrap().status, "resolved");
    }

    #[test]
    fn test_stats_groups() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_report(&new_report("1", "Infrastructure")).unwrap();
        store.create_report(&new_report("1", "Infrastructure")).unwrap();
        store.create_report(&new_report("2", "Security")).unwrap();
        store.update_status(a.id, "in_progress").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category.get("Infrastructure"), Some(&2));
        assert_eq!(stats.by_status.get("pending"), Some(&2));
        assert_eq!(stats.by_status.get("in_progress"), Some(&1));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("reports.db");
        let store = Store::open(&path).unwrap();
        store.put_session("1", "initial", "{}").unwrap();
        assert!(path.exists());
    }
}
