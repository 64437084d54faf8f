//! Per-state transition handlers

use tracing::{debug, error, info, warn};

use super::input::{self, MenuChoice};
use super::{ConversationEngine, Reply, replies};
use crate::catalog::{self, Category};
use crate::domain::{ConversationState, HistoryEntry, ReportData, ReportDraft, Session, report_reference};
use crate::llm::{Generation, GenerationContext};
use crate::prompts::{PromptContext, ReplyStage};
use crate::resolver::{Answer, Scope};
use crate::state::StateResponse;

const CLARIFY_MAX_TOKENS: u32 = 150;
const REPLY_MAX_TOKENS: u32 = 300;

impl ConversationEngine {
    /// Apply one inbound text to the session
    pub(super) async fn step(&self, phone: &str, session: &mut Session, text: &str) -> StateResponse<Reply> {
        debug!(state = %session.state, "ConversationEngine::step: called");

        if input::is_menu_command(text) {
            debug!("step: global reset");
            *session = Session::default();
            let reply = if text.eq_ignore_ascii_case("help") {
                self.phrase(ReplyStage::Help, &session.report_data, replies::help(), text).await
            } else {
                self.phrase(ReplyStage::MainMenu, &session.report_data, replies::main_menu(), text)
                    .await
            };
            return Ok(Reply::save(reply));
        }

        let reply = match session.state {
            ConversationState::Initial => self.on_initial(phone, session, text).await,
            ConversationState::Category => self.on_category(session, text).await,
            ConversationState::Subcategory => self.on_subcategory(session, text).await,
            ConversationState::Description => self.on_description(session, text),
            ConversationState::Location => self.on_location(session, text),
            ConversationState::EvidenceQuestion => self.on_evidence_question(session, text),
            ConversationState::EvidenceMedia => self.on_evidence_media(session, text),
            ConversationState::Confirm => return self.on_confirm(phone, session, text).await,
        };
        Ok(reply)
    }

    async fn on_initial(&self, phone: &str, session: &mut Session, text: &str) -> Reply {
        let data = &session.report_data;

        if input::is_view_reports(text) {
            debug!("on_initial: view reports");
            return Reply::keep(self.list_reports(phone).await);
        }

        if data.awaiting_clarification && !text.is_empty() && !input::is_menu_token(text) {
            debug!("on_initial: answer to clarifying question");
            return self.on_issue(session, text).await;
        }

        if data.category.is_some() || data.description.is_some() {
            debug!("on_initial: resuming interrupted report");
            session.report_data.awaiting_clarification = false;
            return Reply::save(self.resume(session));
        }

        if input::is_greeting(text) {
            debug!("on_initial: greeting");
            return Reply::keep(self.phrase(ReplyStage::Greeting, data, replies::welcome(), text).await);
        }

        match input::menu_choice(text) {
            Some(MenuChoice::Report) => {
                debug!("on_initial: start report");
                let language = session.report_data.language.take();
                session.report_data = ReportData {
                    language,
                    ..Default::default()
                };
                session.state = ConversationState::Category;
                Reply::save(replies::category_menu())
            }
            Some(MenuChoice::ViewReports) => Reply::keep(self.list_reports(phone).await),
            Some(MenuChoice::Help) => Reply::keep(self.phrase(ReplyStage::Help, data, replies::help(), text).await),
            None if input::is_issue_description(text) => {
                debug!("on_initial: free-text issue");
                self.on_issue(session, text).await
            }
            None => Reply::keep(
                self.phrase(ReplyStage::MainMenu, data, replies::main_menu(), text)
                    .await,
            ),
        }
    }

    /// Jump to the step matching the most advanced field already held
    ///
    /// A description held without a category goes back to the category
    /// menu first, so the report can still be completed.
    fn resume(&self, session: &mut Session) -> String {
        let data = &session.report_data;
        match data.category.as_deref().and_then(catalog::find_by_name) {
            None if data.description.is_some() => {
                session.state = ConversationState::Category;
                replies::category_menu()
            }
            Some(category)
                if category.has_subcategories() && data.subcategory.is_none() && data.description.is_none() =>
            {
                session.state = ConversationState::Subcategory;
                replies::subcategory_menu(category)
            }
            _ => self.continue_collection(session),
        }
    }

    /// Free-text issue description, possibly answering a clarifying question
    async fn on_issue(&self, session: &mut Session, text: &str) -> Reply {
        let limit = self.config.history_limit;
        let data = &mut session.report_data;
        let description = match (data.awaiting_clarification, data.description.take()) {
            (true, Some(previous)) => format!("{} {}", previous, text),
            _ => text.to_string(),
        };
        data.description = Some(description.clone());
        data.push_history(HistoryEntry::user(text), limit);

        let capability_answered = match self.resolver.classify_issue(&description).await {
            Answer::Matched(category) => {
                info!(category = category.name, "Issue classified");
                session.report_data.awaiting_clarification = false;
                let next = self.select_category(session, category);
                return Reply::save(format!("{}\n\n{}", replies::category_detected(category.name), next));
            }
            Answer::Unmatched => true,
            Answer::Unavailable => {
                debug!("on_issue: capability unavailable, no clarifying question");
                false
            }
        };

        let data = &mut session.report_data;
        if capability_answered && data.clarification_rounds() < self.config.max_clarifications {
            let ctx = GenerationContext {
                template: "clarify",
                prompt: PromptContext::from_report_data("clarify", data).with_options(&catalog::category_names()),
                max_tokens: CLARIFY_MAX_TOKENS,
            };
            if let Generation::Text(question) = self.generator.generate(&ctx, text).await {
                debug!(rounds = data.clarification_rounds() + 1, "on_issue: asking clarifying question");
                data.push_history(HistoryEntry::assistant(question.clone()), limit);
                data.awaiting_clarification = true;
                session.state = ConversationState::Initial;
                return Reply::save(question);
            }
        }

        debug!("on_issue: no category, falling back to the category menu");
        data.awaiting_clarification = false;
        session.state = ConversationState::Category;
        Reply::save(replies::category_unclear())
    }

    async fn on_category(&self, session: &mut Session, text: &str) -> Reply {
        let resolved = self
            .resolver
            .resolve(Scope::Categories, text)
            .await
            .and_then(catalog::find_by_name);
        match resolved {
            Some(category) => {
                info!(category = category.name, "Category selected");
                Reply::save(self.select_category(session, category))
            }
            None => {
                debug!("on_category: no match");
                Reply::keep(replies::invalid_category())
            }
        }
    }

    async fn on_subcategory(&self, session: &mut Session, text: &str) -> Reply {
        let Some(category) = session.report_data.category.as_deref().and_then(catalog::find_by_name) else {
            warn!("Subcategory step without a valid category, asking again");
            session.state = ConversationState::Category;
            return Reply::save(replies::category_menu());
        };
        if !category.has_subcategories() {
            return Reply::save(self.continue_collection(session));
        }

        if let Some(subcategory) = self.resolver.resolve(Scope::Subcategories(category), text).await {
            info!(category = category.name, subcategory, "Subcategory selected");
            session.report_data.subcategory = Some(subcategory.to_string());
            return Reply::save(self.continue_collection(session));
        }

        if self.is_free_text(text) {
            debug!("on_subcategory: free text taken as the description");
            session.report_data.subcategory = None;
            session.report_data.description = Some(text.to_string());
            return Reply::save(self.continue_collection(session));
        }

        Reply::keep(replies::invalid_subcategory(category))
    }

    fn on_description(&self, session: &mut Session, text: &str) -> Reply {
        if text.chars().count() < self.config.min_description_len {
            debug!(len = text.chars().count(), "on_description: too short");
            return Reply::keep(replies::description_too_short(self.config.min_description_len));
        }
        session.report_data.description = Some(text.to_string());
        Reply::save(self.continue_collection(session))
    }

    fn on_location(&self, session: &mut Session, text: &str) -> Reply {
        let data = &mut session.report_data;
        let location = match data.location.take() {
            Some(previous) => format!("{} {}", previous, text).trim().to_string(),
            None => text.to_string(),
        };
        let len = location.chars().count();
        data.location = (!location.is_empty()).then_some(location);

        if len < self.config.min_location_len {
            debug!(len, "on_location: need more detail");
            return Reply::save(replies::more_location());
        }
        session.state = ConversationState::EvidenceQuestion;
        Reply::save(replies::evidence_question())
    }

    fn on_evidence_question(&self, session: &mut Session, text: &str) -> Reply {
        let data = &session.report_data;
        let count = data.evidence_files.len();
        if count > 0 {
            debug!(count, "on_evidence_question: evidence already attached");
            let reply = replies::evidence_already(count, &replies::confirmation(data));
            session.state = ConversationState::Confirm;
            return Reply::save(reply);
        }

        if input::is_done(text) || input::is_skip(text) {
            let reply = replies::confirmation(data);
            session.state = ConversationState::Confirm;
            Reply::save(reply)
        } else if input::is_evidence_yes(text) {
            session.state = ConversationState::EvidenceMedia;
            Reply::save(replies::evidence_upload())
        } else {
            Reply::keep(replies::evidence_clarify())
        }
    }

    fn on_evidence_media(&self, session: &mut Session, text: &str) -> Reply {
        if !(input::is_done(text) || input::is_no_more(text)) {
            return Reply::keep(replies::evidence_reminder());
        }
        let data = &session.report_data;
        let confirmation = replies::confirmation(data);
        let reply = match data.evidence_files.len() {
            0 => confirmation,
            count => replies::evidence_total(count, &confirmation),
        };
        session.state = ConversationState::Confirm;
        Reply::save(reply)
    }

    async fn on_confirm(&self, phone: &str, session: &mut Session, text: &str) -> StateResponse<Reply> {
        if let Some(category) = input::correction_category(text) {
            info!(category = category.name, "Category corrected at confirmation");
            let data = &mut session.report_data;
            data.category = Some(category.name.to_string());
            data.subcategory = None;
            return Ok(Reply::save(replies::category_corrected(category.name, data)));
        }

        if input::is_affirmative(text) {
            let draft = match ReportDraft::from_report_data(phone, &session.report_data) {
                Ok(draft) => draft,
                Err(missing) => {
                    warn!(%missing, "Confirmation with a missing field");
                    session.state = ConversationState::Initial;
                    return Ok(Reply::save(replies::missing_field(missing)));
                }
            };

            return match self.reports.create(draft).await {
                Ok(report) => {
                    let reference = report_reference(&report.category, report.created_at);
                    info!(id = report.id, %reference, "Report filed");
                    *session = Session::default();
                    Ok(Reply::clear(replies::submitted(&reference)))
                }
                Err(e) => {
                    error!(error = %e, "Failed to create report");
                    Ok(Reply::keep(replies::save_failed()))
                }
            };
        }

        if input::is_negative(text) {
            info!("Report cancelled");
            *session = Session::default();
            return Ok(Reply::clear(replies::cancelled()));
        }

        Ok(Reply::keep(replies::confirm_clarify(&session.report_data)))
    }

    /// Record the category and move to the next step
    fn select_category(&self, session: &mut Session, category: &'static Category) -> String {
        let data = &mut session.report_data;
        data.category = Some(category.name.to_string());
        data.subcategory = None;
        if category.has_subcategories() {
            session.state = ConversationState::Subcategory;
            return replies::subcategory_menu(category);
        }
        self.continue_collection(session)
    }

    /// Ask for the first required field still missing after classification
    fn continue_collection(&self, session: &mut Session) -> String {
        let data = &session.report_data;
        if !self.has_description(data) {
            session.state = ConversationState::Description;
            return replies::describe_prompt(data.category.as_deref().unwrap_or("reported"), data.subcategory.as_deref());
        }
        if data.location.is_none() {
            session.state = ConversationState::Location;
            return replies::location_prompt();
        }
        session.state = ConversationState::EvidenceQuestion;
        replies::evidence_question()
    }

    fn has_description(&self, data: &ReportData) -> bool {
        data.description
            .as_deref()
            .is_some_and(|d| d.trim().chars().count() >= self.config.min_description_len)
    }

    /// Long text that is not a bare number
    fn is_free_text(&self, text: &str) -> bool {
        text.chars().count() >= self.config.min_free_text_len && text.parse::<f64>().is_err()
    }

    async fn list_reports(&self, phone: &str) -> String {
        match self.reports.find_by_owner(phone).await {
            Ok(reports) => {
                debug!(count = reports.len(), "list_reports: loaded");
                replies::report_list(&reports)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load reports");
                replies::reports_error()
            }
        }
    }

    /// Generated phrasing when enabled and available, `fallback` otherwise
    async fn phrase(&self, stage: ReplyStage, data: &ReportData, fallback: String, text: &str) -> String {
        if !self.config.generative_replies || !self.generator.is_available() {
            return fallback;
        }
        let ctx = GenerationContext {
            template: "assistant",
            prompt: PromptContext::for_reply(stage, data),
            max_tokens: REPLY_MAX_TOKENS,
        };
        let user_text = if text.is_empty() { stage.name() } else { text };
        match self.generator.generate(&ctx, user_text).await {
            Generation::Text(reply) => reply,
            _ => {
                debug!(stage = stage.name(), "phrase: using fixed reply");
                fallback
            }
        }
    }
}
