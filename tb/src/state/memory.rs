//! In-process gateways for ephemeral chats and tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::gateway::{ReportGateway, SessionGateway};
use super::messages::{StateError, StateResponse};
use crate::domain::{Report, ReportDraft, ReportStatus, Session};

/// Sessions and reports held in memory, lost on exit
#[derive(Default)]
pub struct MemoryGateway {
    sessions: Mutex<HashMap<String, Session>>,
    reports: Mutex<Vec<Report>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with a store error
    pub fn set_failing(&self, failing: bool) {
        debug!(failing, "MemoryGateway::set_failing: called");
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of all reports, oldest first
    pub async fn reports(&self) -> Vec<Report> {
        self.reports.lock().await.clone()
    }

    fn check(&self) -> StateResponse<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StateError::StoreError("memory gateway unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionGateway for MemoryGateway {
    async fn get(&self, phone_number: &str) -> StateResponse<Option<Session>> {
        debug!(%phone_number, "MemoryGateway::get: called");
        self.check()?;
        Ok(self.sessions.lock().await.get(phone_number).cloned())
    }

    async fn set(&self, phone_number: &str, session: &Session) -> StateResponse<()> {
        debug!(%phone_number, state = %session.state, "MemoryGateway::set: called");
        self.check()?;
        self.sessions
            .lock()
            .await
            .insert(phone_number.to_string(), session.clone());
        Ok(())
    }

    async fn clear(&self, phone_number: &str) -> StateResponse<()> {
        debug!(%phone_number, "MemoryGateway::clear: called");
        self.check()?;
        self.sessions.lock().await.remove(phone_number);
        Ok(())
    }
}

#[async_trait]
impl ReportGateway for MemoryGateway {
    async fn create(&self, draft: ReportDraft) -> StateResponse<Report> {
        debug!(phone_number = %draft.phone_number, "MemoryGateway::create: called");
        self.check()?;
        let now = reportstore::now_ms();
        let report = Report {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            phone_number: draft.phone_number,
            category: draft.category,
            subcategory: draft.subcategory,
            description: draft.description,
            location: draft.location,
            evidence_files: draft.evidence_files,
            status: ReportStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.reports.lock().await.push(report.clone());
        Ok(report)
    }

    async fn find_by_owner(&self, phone_number: &str) -> StateResponse<Vec<Report>> {
        debug!(%phone_number, "MemoryGateway::find_by_owner: called");
        self.check()?;
        Ok(self
            .reports
            .lock()
            .await
            .iter()
            .rev()
            .filter(|r| r.phone_number == phone_number)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: i64, status: ReportStatus) -> StateResponse<usize> {
        debug!(id, %status, "MemoryGateway::update_status: called");
        self.check()?;
        let mut reports = self.reports.lock().await;
        let mut changed = 0;
        for report in reports.iter_mut().filter(|r| r.id == id) {
            report.status = status;
            report.updated_at = reportstore::now_ms();
            changed += 1;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(phone: &str, category: &str) -> ReportDraft {
        ReportDraft {
            phone_number: phone.to_string(),
            category: category.to_string(),
            subcategory: None,
            description: "Streetlights have been off for a week".to_string(),
            location: "Kisumu".to_string(),
            evidence_files: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_find_by_owner_newest_first() {
        let gateway = MemoryGateway::new();
        gateway.create(draft("1", "Infrastructure")).await.unwrap();
        gateway.create(draft("1", "Security")).await.unwrap();
        gateway.create(draft("2", "Other")).await.unwrap();

        let mine = gateway.find_by_owner("1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].category, "Security");
    }

    #[tokio::test]
    async fn test_failing_gateway_errors() {
        let gateway = MemoryGateway::new();
        gateway.set_failing(true);
        assert!(gateway.get("1").await.is_err());
        assert!(gateway.create(draft("1", "Other")).await.is_err());

        gateway.set_failing(false);
        assert!(gateway.get("1").await.unwrap().is_none());
    }
}
