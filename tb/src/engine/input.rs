//! Keyword predicates over inbound text
//!
//! All matching is case-insensitive on trimmed input. English and Swahili
//! forms are accepted where users are known to send them.

use crate::resolver::{self, has_phrase, has_word};

const GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "habari",
    "jambo",
    "hujambo",
    "sijambo",
    "mambo",
    "poa",
    "greetings",
    "salutations",
    "howdy",
    "yo",
    "sup",
];

const DONE_WORDS: &[&str] = &["done", "finish", "finished", "complete", "ready", "that's all", "that's it", "im done", "i'm done"];

const NEGATIONS: &[&str] = &["no", "not", "wrong", "incorrect", "should be", "lies with", "actually"];

/// Tokens that select from the main menu; never treated as issue text
const MENU_TOKENS: &[&str] = &["1", "2", "3", "menu", "help", "report", "view", "my reports", "yes", "no"];

/// Main menu selection in INITIAL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Report,
    ViewReports,
    Help,
}

fn normalized(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Greeting at the start, end, or as a whole word inside the message
pub fn is_greeting(text: &str) -> bool {
    let lowered = normalized(text);
    GREETINGS.iter().any(|g| {
        lowered == *g
            || lowered.starts_with(&format!("{} ", g))
            || lowered.contains(&format!(" {} ", g))
            || lowered.ends_with(&format!(" {}", g))
    })
}

/// Global reset command, honored in every state
pub fn is_menu_command(text: &str) -> bool {
    matches!(normalized(text).as_str(), "menu" | "help")
}

/// Explicit "my reports" request
pub fn is_view_reports(text: &str) -> bool {
    normalized(text) == "my reports"
}

/// Short menu token that must not be read as an issue description
pub fn is_menu_token(text: &str) -> bool {
    let lowered = normalized(text);
    MENU_TOKENS.contains(&lowered.as_str())
}

/// Main menu selection by number or by name
pub fn menu_choice(text: &str) -> Option<MenuChoice> {
    match normalized(text).as_str() {
        "1" | "report an issue" | "report issue" | "ripoti tatizo" => Some(MenuChoice::Report),
        "2" | "view reports" | "view my reports" | "my reports" | "angalia ripoti zangu" => Some(MenuChoice::ViewReports),
        "3" | "help" | "msaada" => Some(MenuChoice::Help),
        _ => None,
    }
}

/// Free text in INITIAL that reads like an issue report
pub fn is_issue_description(text: &str) -> bool {
    text.trim().chars().count() > 3 && !is_menu_token(text) && resolver::is_issue_text(text)
}

/// Finished sending evidence
pub fn is_done(text: &str) -> bool {
    let lowered = normalized(text);
    DONE_WORDS.iter().any(|w| has_phrase(&lowered, w))
}

/// "No more" evidence
pub fn is_no_more(text: &str) -> bool {
    let lowered = normalized(text);
    lowered == "no" || lowered == "n" || lowered.contains("no more")
}

/// Wants to send evidence
pub fn is_evidence_yes(text: &str) -> bool {
    matches!(normalized(text).as_str(), "yes" | "y" | "ndiyo" | "ndio" | "sure" | "ok")
}

/// Declines to send evidence
pub fn is_skip(text: &str) -> bool {
    matches!(normalized(text).as_str(), "no" | "n" | "hapana" | "skip")
}

/// Confirms the report summary
pub fn is_affirmative(text: &str) -> bool {
    let lowered = normalized(text);
    lowered == "y" || ["yes", "ready", "ndiyo", "ndio"].iter().any(|w| has_word(&lowered, w))
}

/// Rejects the report summary
pub fn is_negative(text: &str) -> bool {
    matches!(normalized(text).as_str(), "no" | "n" | "hapana")
}

/// Category named in a correction such as "no, it should be education"
///
/// Needs a negation word as well as a catalog name; a bare "no" is a
/// cancellation, never a correction.
pub fn correction_category(text: &str) -> Option<&'static crate::catalog::Category> {
    if is_negative(text) {
        return None;
    }
    let lowered = normalized(text);
    if !NEGATIONS.iter().any(|n| has_phrase(&lowered, n)) {
        return None;
    }
    resolver::mentioned_category(&lowered)
}
