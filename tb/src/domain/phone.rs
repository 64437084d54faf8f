//! Phone identifier normalization

use tracing::debug;

/// Normalize a transport sender id to digits only
///
/// Accepts forms like `whatsapp:+254712345678`, `254712345678@c.us` or
/// `+254 712-345-678` and returns `254712345678`.
pub fn normalize_phone(raw: &str) -> String {
    debug!(%raw, "normalize_phone: called");
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("whatsapp:").unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("@c.us").unwrap_or(trimmed);
    trimmed.chars().filter(|c| c.is_ascii_digit()).collect()
}
