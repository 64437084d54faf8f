//! Gateways the conversation engine persists through

use async_trait::async_trait;

use super::StateResponse;
use crate::domain::{Report, ReportDraft, ReportStatus, Session};

/// Per-phone-number conversation records
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Load the session; `None` for an unseen identifier
    async fn get(&self, phone_number: &str) -> StateResponse<Option<Session>>;

    async fn set(&self, phone_number: &str, session: &Session) -> StateResponse<()>;

    async fn clear(&self, phone_number: &str) -> StateResponse<()>;
}

/// Finalized issue reports
#[async_trait]
pub trait ReportGateway: Send + Sync {
    async fn create(&self, draft: ReportDraft) -> StateResponse<Report>;

    /// Reports filed by one phone number, newest first
    async fn find_by_owner(&self, phone_number: &str) -> StateResponse<Vec<Report>>;

    /// Returns the number of reports changed
    async fn update_status(&self, id: i64, status: ReportStatus) -> StateResponse<usize>;
}
