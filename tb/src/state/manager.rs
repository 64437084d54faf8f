//! StateManager - actor that owns the report store
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use async_trait::async_trait;
use reportstore::{NewReport, ReportRecord, ReportStats, SessionRecord, Store};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::gateway::{ReportGateway, SessionGateway};
use super::messages::{StateCommand, StateError, StateResponse};
use crate::domain::{ConversationState, Report, ReportData, ReportDraft, ReportStatus, Session};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the database at `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;
        Ok(Self::start(store))
    }

    /// Spawn over a throwaway in-memory database
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        let store = Store::open_in_memory()?;
        Ok(Self::start(store))
    }

    fn start(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Get one report by id
    pub async fn get_report(&self, id: i64) -> StateResponse<Option<Report>> {
        debug!(id, "get_report: called");
        self.request(|reply| StateCommand::GetReport { id, reply }).await
    }

    /// All reports, newest first
    pub async fn list_reports(&self) -> StateResponse<Vec<Report>> {
        debug!("list_reports: called");
        self.request(|reply| StateCommand::ListReports { reply }).await
    }

    /// Totals by status and category
    pub async fn report_stats(&self) -> StateResponse<ReportStats> {
        debug!("report_stats: called");
        self.request(|reply| StateCommand::Stats { reply }).await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl SessionGateway for StateManager {
    async fn get(&self, phone_number: &str) -> StateResponse<Option<Session>> {
        debug!(%phone_number, "StateManager::get: called");
        let phone_number = phone_number.to_string();
        self.request(|reply| StateCommand::GetSession { phone_number, reply })
            .await
    }

    async fn set(&self, phone_number: &str, session: &Session) -> StateResponse<()> {
        debug!(%phone_number, state = %session.state, "StateManager::set: called");
        let phone_number = phone_number.to_string();
        let session = session.clone();
        self.request(|reply| StateCommand::PutSession {
            phone_number,
            session,
            reply,
        })
        .await
    }

    async fn clear(&self, phone_number: &str) -> StateResponse<()> {
        debug!(%phone_number, "StateManager::clear: called");
        let phone_number = phone_number.to_string();
        self.request(|reply| StateCommand::ClearSession { phone_number, reply })
            .await
    }
}

#[async_trait]
impl ReportGateway for StateManager {
    async fn create(&self, draft: ReportDraft) -> StateResponse<Report> {
        debug!(phone_number = %draft.phone_number, category = %draft.category, "StateManager::create: called");
        self.request(|reply| StateCommand::CreateReport { draft, reply }).await
    }

    async fn find_by_owner(&self, phone_number: &str) -> StateResponse<Vec<Report>> {
        debug!(%phone_number, "StateManager::find_by_owner: called");
        let phone_number = phone_number.to_string();
        self.request(|reply| StateCommand::ReportsByOwner { phone_number, reply })
            .await
    }

    async fn update_status(&self, id: i64, status: ReportStatus) -> StateResponse<usize> {
        debug!(id, %status, "StateManager::update_status: called");
        self.request(|reply| StateCommand::UpdateStatus { id, status, reply })
            .await
    }
}

/// Decode a stored session; an unknown state reads as a fresh conversation
fn session_from_record(record: SessionRecord) -> Session {
    debug!(phone_number = %record.phone_number, state = %record.state, "session_from_record: called");
    let Ok(state) = record.state.parse::<ConversationState>() else {
        warn!(state = %record.state, "Unrecognized stored state, starting over");
        return Session::default();
    };
    match serde_json::from_str::<ReportData>(&record.report_data) {
        Ok(report_data) => Session::new(state, report_data),
        Err(e) => {
            warn!(error = %e, "Unreadable stored report data, starting over");
            Session::default()
        }
    }
}

fn report_from_record(record: ReportRecord) -> StateResponse<Report> {
    let evidence_files = serde_json::from_str(&record.evidence_files)
        .map_err(|e| StateError::DeserializationError(format!("report {} evidence: {}", record.id, e)))?;
    let status = record
        .status
        .parse::<ReportStatus>()
        .map_err(StateError::DeserializationError)?;
    Ok(Report {
        id: record.id,
        phone_number: record.phone_number,
        category: record.category,
        subcategory: record.subcategory,
        description: record.description,
        location: record.location,
        evidence_files,
        status,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn reports_from_records(records: Vec<ReportRecord>) -> StateResponse<Vec<Report>> {
    records.into_iter().map(report_from_record).collect()
}

fn new_report(draft: &ReportDraft) -> StateResponse<NewReport> {
    let evidence_files =
        serde_json::to_string(&draft.evidence_files).map_err(|e| StateError::StoreError(e.to_string()))?;
    Ok(NewReport {
        phone_number: draft.phone_number.clone(),
        category: draft.category.clone(),
        subcategory: draft.subcategory.clone(),
        description: draft.description.clone(),
        location: draft.location.clone(),
        evidence_files,
    })
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(e.to_string())
}

/// The actor loop that processes commands
async fn actor_loop(store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: called");
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::GetSession { phone_number, reply } => {
                debug!(%phone_number, "actor_loop: GetSession command");
                let result = store
                    .get_session(&phone_number)
                    .map(|record| record.map(session_from_record))
                    .map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::PutSession {
                phone_number,
                session,
                reply,
            } => {
                debug!(%phone_number, state = %session.state, "actor_loop: PutSession command");
                let result = serde_json::to_string(&session.report_data)
                    .map_err(|e| StateError::StoreError(e.to_string()))
                    .and_then(|data| {
                        store
                            .put_session(&phone_number, session.state.as_str(), &data)
                            .map_err(store_err)
                    });
                let _ = reply.send(result);
            }

            StateCommand::ClearSession { phone_number, reply } => {
                debug!(%phone_number, "actor_loop: ClearSession command");
                let result = store.delete_session(&phone_number).map(|_| ()).map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::CreateReport { draft, reply } => {
                debug!(phone_number = %draft.phone_number, "actor_loop: CreateReport command");
                let result = new_report(&draft)
                    .and_then(|new| store.create_report(&new).map_err(store_err))
                    .and_then(report_from_record);
                let _ = reply.send(result);
            }

            StateCommand::GetReport { id, reply } => {
                debug!(id, "actor_loop: GetReport command");
                let result = store
                    .get_report(id)
                    .map_err(store_err)
                    .and_then(|record| record.map(report_from_record).transpose());
                let _ = reply.send(result);
            }

            StateCommand::ReportsByOwner { phone_number, reply } => {
                debug!(%phone_number, "actor_loop: ReportsByOwner command");
                let result = store
                    .reports_by_phone(&phone_number)
                    .map_err(store_err)
                    .and_then(reports_from_records);
                let _ = reply.send(result);
            }

            StateCommand::ListReports { reply } => {
                debug!("actor_loop: ListReports command");
                let result = store.list_reports().map_err(store_err).and_then(reports_from_records);
                let _ = reply.send(result);
            }

            StateCommand::UpdateStatus { id, status, reply } => {
                debug!(id, %status, "actor_loop: UpdateStatus command");
                let result = store.update_status(id, status.as_str()).map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::Stats { reply } => {
                debug!("actor_loop: Stats command");
                let _ = reply.send(store.stats().map_err(store_err));
            }

            StateCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
