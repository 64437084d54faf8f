//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Conversational reply prompt
pub const ASSISTANT: &str = include_str!("../../prompts/assistant.pmt");

/// Constrained single-answer classification prompt
pub const CLASSIFY: &str = include_str!("../../prompts/classify.pmt");

/// Clarifying question prompt for unclassified issues
pub const CLARIFY: &str = include_str!("../../prompts/clarify.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "assistant" => Some(ASSISTANT),
        "classify" => Some(CLASSIFY),
        "clarify" => Some(CLARIFY),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_classify_has_sentinel() {
        let classify = get_embedded("classify").unwrap();
        assert!(classify.contains("UNKNOWN"));
        assert!(classify.contains("{{#each options}}"));
    }

    #[test]
    fn test_get_embedded_assistant() {
        assert!(get_embedded("assistant").unwrap().contains("TrustBridge"));
        assert!(get_embedded("clarify").unwrap().contains("ONE"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
