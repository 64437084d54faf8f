//! Conversation engine
//!
//! One turn: load the session, decide, persist, answer. Turns for the same
//! sender run one at a time; every failure inside a turn becomes an
//! apology, never an error.

pub mod input;
pub mod replies;
mod turn;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ConversationConfig;
use crate::domain::{EvidenceFile, ReportData, Session, normalize_phone};
use crate::language::{self, LanguageDetector};
use crate::llm::Generator;
use crate::resolver::Resolver;
use crate::state::{ReportGateway, SessionGateway, StateResponse};

/// What to do with the session after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    /// Pure re-prompt
    Unchanged,
    Save,
    Clear,
}

/// Outbound text plus the persistence decision
#[derive(Debug)]
struct Reply {
    text: String,
    persist: Persist,
}

impl Reply {
    fn keep(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            persist: Persist::Unchanged,
        }
    }

    fn save(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            persist: Persist::Save,
        }
    }

    fn clear(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            persist: Persist::Clear,
        }
    }
}

/// Drives per-sender reporting conversations
pub struct ConversationEngine {
    sessions: Arc<dyn SessionGateway>,
    reports: Arc<dyn ReportGateway>,
    generator: Generator,
    resolver: Resolver,
    detector: Option<Arc<dyn LanguageDetector>>,
    config: ConversationConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationEngine {
    pub fn new(
        sessions: Arc<dyn SessionGateway>,
        reports: Arc<dyn ReportGateway>,
        generator: Generator,
        config: ConversationConfig,
    ) -> Self {
        debug!(?config, has_capability = generator.is_available(), "ConversationEngine::new: called");
        Self {
            sessions,
            reports,
            resolver: Resolver::new(generator.clone()),
            generator,
            detector: None,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Use a remote language detector instead of the local heuristic alone
    pub fn with_detector(mut self, detector: Option<Arc<dyn LanguageDetector>>) -> Self {
        self.detector = detector;
        self
    }

    /// Process one inbound message and return the reply
    pub async fn handle(&self, sender: &str, text: &str) -> String {
        let phone = normalize_phone(sender);
        debug!(%phone, text_len = text.len(), "ConversationEngine::handle: called");
        if phone.is_empty() {
            warn!(%sender, "Sender has no usable identifier");
            return replies::apology();
        }

        let lock = self.session_lock(&phone).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(&phone, text).await
        };
        self.release_lock(&phone, lock).await;
        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(%phone, error = %e, "Turn failed");
                replies::apology()
            }
        }
    }

    /// Attach an uploaded file to the sender's in-progress report
    ///
    /// Never changes the conversation state.
    pub async fn attach_evidence(&self, sender: &str, file: EvidenceFile) -> String {
        let phone = normalize_phone(sender);
        debug!(%phone, file_name = %file.file_name, "ConversationEngine::attach_evidence: called");
        if phone.is_empty() {
            warn!(%sender, "Sender has no usable identifier");
            return replies::apology();
        }

        let lock = self.session_lock(&phone).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_attach(&phone, file).await
        };
        self.release_lock(&phone, lock).await;
        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(%phone, error = %e, "Evidence attach failed");
                replies::apology()
            }
        }
    }

    /// Current session for a sender; unseen senders read as a fresh session
    pub async fn session(&self, sender: &str) -> StateResponse<Session> {
        let phone = normalize_phone(sender);
        Ok(self.sessions.get(&phone).await?.unwrap_or_default())
    }

    async fn session_lock(&self, phone: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // Drop locks no turn is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(phone.to_string()).or_default().clone()
    }

    /// Forget the sender's lock once no other turn holds or awaits it
    async fn release_lock(&self, phone: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().await;
        if locks.get(phone).is_some_and(|held| Arc::strong_count(held) == 1) {
            debug!(%phone, "ConversationEngine::release_lock: removing idle lock");
            locks.remove(phone);
        }
    }

    async fn run_turn(&self, phone: &str, text: &str) -> StateResponse<String> {
        let loaded = self.sessions.get(phone).await?;
        let existed = loaded.is_some();
        let mut session = loaded.unwrap_or_default();
        let before = session.state;

        let detected = self.detect_language(&mut session.report_data, text).await;
        let reply = self.step(phone, &mut session, text.trim()).await?;

        match reply.persist {
            Persist::Clear => self.sessions.clear(phone).await?,
            Persist::Save => self.sessions.set(phone, &session).await?,
            Persist::Unchanged if detected || !existed || session.state != before => {
                self.sessions.set(phone, &session).await?
            }
            Persist::Unchanged => debug!(%phone, "run_turn: nothing to persist"),
        }

        info!(%phone, from = %before, to = %session.state, persist = ?reply.persist, "Turn complete");
        Ok(reply.text)
    }

    async fn run_attach(&self, phone: &str, file: EvidenceFile) -> StateResponse<String> {
        let mut session = self.sessions.get(phone).await?.unwrap_or_default();
        let data = &session.report_data;
        let accepts = session.state.accepts_evidence()
            || (session.state == crate::domain::ConversationState::Initial && data.description.is_some());
        if !accepts {
            debug!(state = %session.state, "run_attach: no report in progress");
            return Ok(replies::start_report_first());
        }

        session.report_data.evidence_files.push(file);
        self.sessions.set(phone, &session).await?;
        let count = session.report_data.evidence_files.len();
        info!(%phone, count, "Evidence attached");
        Ok(replies::evidence_received(count))
    }

    /// Fill in the session language once; returns whether it changed
    async fn detect_language(&self, data: &mut ReportData, text: &str) -> bool {
        if data.language.is_some() || text.trim().chars().count() <= 3 {
            return false;
        }
        let tag = language::detect_language(self.detector.as_deref(), text).await;
        let tag = if tag == "sw" || language::is_swahili(text) { "sw" } else { "en" };
        debug!(%tag, "ConversationEngine::detect_language: detected");
        data.language = Some(tag.to_string());
        true
    }
}
