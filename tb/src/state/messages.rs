//! State manager messages
//!
//! Commands and responses for the actor pattern.

use reportstore::ReportStats;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Report, ReportDraft, ReportStatus, Session};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Session operations
    GetSession {
        phone_number: String,
        reply: oneshot::Sender<StateResponse<Option<Session>>>,
    },
    PutSession {
        phone_number: String,
        session: Session,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ClearSession {
        phone_number: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Report operations
    CreateReport {
        draft: ReportDraft,
        reply: oneshot::Sender<StateResponse<Report>>,
    },
    GetReport {
        id: i64,
        reply: oneshot::Sender<StateResponse<Option<Report>>>,
    },
    ReportsByOwner {
        phone_number: String,
        reply: oneshot::Sender<StateResponse<Vec<Report>>>,
    },
    ListReports {
        reply: oneshot::Sender<StateResponse<Vec<Report>>>,
    },
    UpdateStatus {
        id: i64,
        status: ReportStatus,
        reply: oneshot::Sender<StateResponse<usize>>,
    },
    Stats {
        reply: oneshot::Sender<StateResponse<ReportStats>>,
    },

    // Lifecycle
    Shutdown,
}
