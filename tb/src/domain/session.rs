//! Conversation session types
//!
//! A session is the per-phone-number record of where a user is in the
//! reporting flow and which report fields have been collected so far.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Conversation stage
///
/// The machine has no terminal state: `Initial` is both where a
/// conversation starts and where it returns after completion or cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Initial,
    Category,
    Subcategory,
    Description,
    Location,
    EvidenceQuestion,
    EvidenceMedia,
    Confirm,
}

impl ConversationState {
    /// All states, in flow order
    pub const ALL: [ConversationState; 8] = [
        Self::Initial,
        Self::Category,
        Self::Subcategory,
        Self::Description,
        Self::Location,
        Self::EvidenceQuestion,
        Self::EvidenceMedia,
        Self::Confirm,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Description => "description",
            Self::Location => "location",
            Self::EvidenceQuestion => "evidence_question",
            Self::EvidenceMedia => "evidence_media",
            Self::Confirm => "confirm",
        }
    }

    /// Whether out-of-band evidence may be attached in this state
    pub fn accepts_evidence(&self) -> bool {
        matches!(
            self,
            Self::Description | Self::Location | Self::EvidenceQuestion | Self::EvidenceMedia
        )
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConversationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ConversationState::from_str: called");
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("Unknown conversation state: '{}'", s))
    }
}

/// Speaker of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One exchanged message kept for clarifying conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Speaker,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
        }
    }
}

/// A media file attached to an in-progress report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFile {
    pub file_name: String,
    pub file_path: String,
    pub mime_type: String,
}

/// Report fields accumulated during a conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportData {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub evidence_files: Vec<EvidenceFile>,
    /// Detected language tag ("en" or "sw")
    pub language: Option<String>,
    pub conversation_history: Vec<HistoryEntry>,
    /// Set while a clarifying question about the issue is unanswered
    pub awaiting_clarification: bool,
}

impl ReportData {
    /// Append to the history, keeping at most `limit` entries
    pub fn push_history(&mut self, entry: HistoryEntry, limit: usize) {
        self.conversation_history.push(entry);
        if self.conversation_history.len() > limit {
            let excess = self.conversation_history.len() - limit;
            self.conversation_history.drain(..excess);
        }
    }

    /// Number of clarifying questions asked in the pending exchange
    pub fn clarification_rounds(&self) -> usize {
        self.conversation_history
            .iter()
            .filter(|e| e.role == Speaker::Assistant)
            .count()
    }

    /// Field-by-field text for summaries and prompt context
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(category) = &self.category {
            lines.push(format!("Category: {}", category));
        }
        if let Some(subcategory) = &self.subcategory {
            lines.push(format!("Subcategory: {}", subcategory));
        }
        if let Some(description) = &self.description {
            lines.push(format!("Description: {}", description));
        }
        if let Some(location) = &self.location {
            lines.push(format!("Location: {}", location));
        }
        if !self.evidence_files.is_empty() {
            lines.push(format!("Evidence: {} file(s)", self.evidence_files.len()));
        }
        lines
    }
}

/// A loaded conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub state: ConversationState,
    pub report_data: ReportData,
}

impl Session {
    pub fn new(state: ConversationState, report_data: ReportData) -> Self {
        Self { state, report_data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_string_roundtrip() {
        for state in ConversationState::ALL {
            assert_eq!(state.as_str().parse::<ConversationState>().unwrap(), state);
        }
        assert!("report_submitted".parse::<ConversationState>().is_err());
    }

    #[test]
    fn test_state_serde_matches_as_str() {
        let json = serde_json::to_string(&ConversationState::EvidenceQuestion).unwrap();
        assert_eq!(json, "\"evidence_question\"");
    }

    #[test]
    fn test_report_data_missing_fields_default() {
        let data: ReportData = serde_json::from_str(r#"{"category":"Healthcare"}"#).unwrap();
        assert_eq!(data.category.as_deref(), Some("Healthcare"));
        assert!(data.evidence_files.is_empty());
        assert!(!data.awaiting_clarification);
    }

    #[test]
    fn test_history_is_capped() {
        let mut data = ReportData::default();
        for i in 0..5 {
            data.push_history(HistoryEntry::user(format!("m{}", i)), 3);
        }
        assert_eq!(data.conversation_history.len(), 3);
        assert_eq!(data.conversation_history[0].content, "m2");
    }

    #[test]
    fn test_summary_lines_skip_absent_fields() {
        let data = ReportData {
            category: Some("Other".to_string()),
            location: Some("Kisumu".to_string()),
            ..Default::default()
        };
        assert_eq!(data.summary_lines(), vec!["Category: Other", "Location: Kisumu"]);
    }
}
