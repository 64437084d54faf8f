//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::{HistoryEntry, ReportData, Speaker};

/// What a conversational reply is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStage {
    /// User greeted; welcome them and show the main menu
    Greeting,
    /// User asked for the menu
    MainMenu,
    /// User asked for help
    Help,
}

impl ReplyStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::MainMenu => "main_menu",
            Self::Help => "help",
        }
    }

    /// Stage-specific instruction placed in the system prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Greeting => {
                "The user just greeted you. Start with \"🏛️ TrustBridge - Kenyan Government Services\", \
                 greet them warmly and list the three options numbered 1 to 3."
            }
            Self::MainMenu => {
                "Show the main menu. Start with \"🏛️ TrustBridge - Kenyan Government Services\" \
                 and list the three options numbered 1 to 3."
            }
            Self::Help => {
                "Explain briefly how reporting works: describe the problem, give its location, optionally \
                 send photos, then confirm. Mention the statuses pending, in_progress and resolved."
            }
        }
    }
}

/// One history line as rendered in prompts
#[derive(Debug, Clone, Serialize)]
pub struct PromptLine {
    pub role: &'static str,
    pub content: String,
}

/// Context for rendering prompt templates
#[derive(Debug, Clone, Serialize, Default)]
pub struct PromptContext {
    /// Step name shown to the model
    pub stage: String,
    /// Stage-specific instruction
    pub instruction: String,
    /// Collected report fields ("Category: Healthcare", ...)
    pub fields: Vec<String>,
    /// Last few exchanged messages
    pub history: Vec<PromptLine>,
    /// Reply language ("English" or "Swahili")
    pub language: String,
    /// Closed answer set for classification prompts
    pub options: Vec<String>,
    /// What the options are ("category", "subcategory")
    pub kind: String,
}

/// History entries shown to the model
const PROMPT_HISTORY: usize = 3;

impl PromptContext {
    /// Context built from a session's collected data
    pub fn from_report_data(stage: &str, data: &ReportData) -> Self {
        debug!(%stage, "PromptContext::from_report_data: called");
        let skip = data.conversation_history.len().saturating_sub(PROMPT_HISTORY);
        Self {
            stage: stage.to_string(),
            fields: data.summary_lines(),
            history: data.conversation_history.iter().skip(skip).map(prompt_line).collect(),
            language: language_name(data.language.as_deref()).to_string(),
            ..Default::default()
        }
    }

    /// Context for a conversational reply
    pub fn for_reply(stage: ReplyStage, data: &ReportData) -> Self {
        debug!(?stage, "PromptContext::for_reply: called");
        Self {
            instruction: stage.instruction().to_string(),
            ..Self::from_report_data(stage.name(), data)
        }
    }

    /// Context for a closed-set classification
    pub fn for_classification(kind: &str, options: &[&str]) -> Self {
        debug!(%kind, option_count = options.len(), "PromptContext::for_classification: called");
        Self {
            stage: "classify".to_string(),
            kind: kind.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            language: language_name(None).to_string(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }
}

fn prompt_line(entry: &HistoryEntry) -> PromptLine {
    PromptLine {
        role: match entry.role {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        },
        content: entry.content.clone(),
    }
}

fn language_name(tag: Option<&str>) -> &'static str {
    match tag {
        Some("sw") => "Swahili",
        _ => "English",
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `.trustbridge/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that honors `<root>/.trustbridge/prompts/` overrides
    pub fn new(root: impl AsRef<Path>) -> Self {
        let user_dir = root.as_ref().join(".trustbridge/prompts");
        let user_dir_exists = user_dir.exists();
        debug!(?user_dir, %user_dir_exists, "PromptLoader::new: called");

        Self {
            hbs: Self::engine(),
            user_dir: if user_dir_exists { Some(user_dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks the user override directory first, then the embedded copy.
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in user override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        debug!(%template_name, stage = %context.stage, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_with_history(n: usize) -> ReportData {
        let mut data = ReportData {
            description: Some("Water pipe burst near the market".to_string()),
            language: Some("sw".to_string()),
            ..Default::default()
        };
        for i in 0..n {
            data.push_history(HistoryEntry::user(format!("message {}", i)), 10);
        }
        data
    }

    #[test]
    fn test_context_keeps_last_three_history_entries() {
        let ctx = PromptContext::from_report_data("clarify", &data_with_history(5));
        let contents: Vec<_> = ctx.history.iter().map(|l| l.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(ctx.language, "Swahili");
    }

    #[test]
    fn test_render_classify_lists_options() {
        let loader = PromptLoader::embedded_only();
        let ctx = PromptContext::for_classification("category", &["Healthcare", "Other"]);
        let prompt = loader.render("classify", &ctx).unwrap();
        assert!(prompt.contains("- Healthcare\n"));
        assert!(prompt.contains("- Other\n"));
        assert!(prompt.contains("category options"));
    }

    #[test]
    fn test_render_does_not_html_escape() {
        let loader = PromptLoader::embedded_only();
        let mut data = data_with_history(0);
        data.description = Some("Road \"closed\" & flooded".to_string());
        let ctx = PromptContext::for_reply(ReplyStage::Greeting, &data);
        let prompt = loader.render("assistant", &ctx).unwrap();
        assert!(prompt.contains("Road \"closed\" & flooded"));
        assert!(prompt.contains("Current step: greeting"));
    }

    #[test]
    fn test_user_override_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join(".trustbridge/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("classify.pmt"), "custom {{kind}}").unwrap();

        let loader = PromptLoader::new(dir.path());
        let ctx = PromptContext::for_classification("subcategory", &["Roads"]);
        assert_eq!(loader.render("classify", &ctx).unwrap(), "custom subcategory");
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.render("nonexistent-template", &PromptContext::default()).is_err());
    }
}
