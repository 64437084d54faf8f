//! Fixed reply texts
//!
//! Used whenever generated phrasing is off or unavailable, so every turn
//! can always answer.

use chrono::{DateTime, Utc};

use crate::catalog::{self, Category};
use crate::domain::{MissingField, Report, ReportData};

/// Reports shown in one listing
pub const REPORTS_SHOWN: usize = 5;

pub fn main_menu() -> String {
    "🏛️ TrustBridge - Kenyan Government Services\n\n1. Report Issue\n2. View Reports\n3. Help".to_string()
}

pub fn welcome() -> String {
    format!("👋 Welcome! I can help you report issues with government services.\n\n{}", main_menu())
}

pub fn help() -> String {
    format!(
        "ℹ️ *How TrustBridge works:*\n\n\
         1. Choose a category (or just describe the problem)\n\
         2. Describe the issue and give its location\n\
         3. Optionally send photos or documents as evidence\n\
         4. Confirm, and your report is filed for review\n\n\
         Report statuses: ⏳ pending, 🔄 in progress, ✅ resolved.\n\
         Type *menu* at any time to start over.\n\n{}",
        main_menu()
    )
}

pub fn category_menu() -> String {
    format!(
        "📋 *Select a Category:*\n\n{}\n\n💡 Type the name or number.",
        catalog::numbered(&catalog::category_names())
    )
}

pub fn invalid_category() -> String {
    format!("❌ I couldn't match that to a category.\n\n{}", category_menu())
}

pub fn category_unclear() -> String {
    format!("🤔 I couldn't tell which area this belongs to.\n\n{}", category_menu())
}

pub fn subcategory_menu(category: &Category) -> String {
    format!(
        "📋 *Select Subcategory for {}:*\n\n{}\n\n💡 Type the name or number.",
        category.name,
        catalog::numbered(category.subcategories)
    )
}

pub fn invalid_subcategory(category: &Category) -> String {
    format!("❌ Invalid option. Please try again.\n\n{}", subcategory_menu(category))
}

pub fn category_detected(name: &str) -> String {
    format!("✅ This sounds like a *{}* issue.", name)
}

pub fn describe_prompt(category: &str, subcategory: Option<&str>) -> String {
    match subcategory {
        Some(sub) => format!("📝 Please describe the {} - {} issue. Be as detailed as possible.", category, sub),
        None => format!("📝 Please describe the {} issue. Be as detailed as possible.", category),
    }
}

pub fn description_too_short(min_len: usize) -> String {
    format!(
        "✏️ Please give a bit more detail (at least {} characters) so the right office can act on it.",
        min_len
    )
}

pub fn location_prompt() -> String {
    "📍 Please provide the location of this issue:".to_string()
}

pub fn more_location() -> String {
    "📍 Please provide more location details:".to_string()
}

pub fn evidence_question() -> String {
    "📷 Do you have photos or documents as evidence?\n\nReply *yes*, *no*, or *done*.".to_string()
}

pub fn evidence_clarify() -> String {
    "Please reply with *yes*, *no*, or *done*.".to_string()
}

pub fn evidence_upload() -> String {
    "Great! Send your evidence (photos/images/documents). Type *done* when finished.".to_string()
}

pub fn evidence_reminder() -> String {
    "Please send a photo/image/document or type *done*.".to_string()
}

pub fn evidence_received(count: usize) -> String {
    format!("📎 Evidence received ({} file(s)). Send more or type *done* when finished.", count)
}

pub fn evidence_already(count: usize, confirmation: &str) -> String {
    format!("✅ {} file(s) already uploaded.\n\n{}", count, confirmation)
}

pub fn evidence_total(count: usize, confirmation: &str) -> String {
    format!("✅ {} file(s) received.\n\n{}", count, confirmation)
}

pub fn start_report_first() -> String {
    "📎 Please start a report before sending evidence. Type *1* to report an issue.".to_string()
}

/// Confirmation summary for the collected fields
pub fn confirmation(data: &ReportData) -> String {
    let mut summary = Vec::new();
    summary.push(format!("*Category:* {}", data.category.as_deref().unwrap_or("-")));
    if let Some(sub) = &data.subcategory {
        summary.push(format!("*Subcategory:* {}", sub));
    }
    summary.push(format!("*Description:* {}", data.description.as_deref().unwrap_or("-")));
    summary.push(format!("*Location:* {}", data.location.as_deref().unwrap_or("-")));
    if !data.evidence_files.is_empty() {
        summary.push(format!("*Evidence:* {} file(s)", data.evidence_files.len()));
    }
    format!(
        "📝 *Confirm Your Report:*\n\n{}\n\nReply *yes* to submit or *no* to cancel.",
        summary.join("\n")
    )
}

pub fn confirm_clarify(data: &ReportData) -> String {
    format!("Please reply with *yes* or *no*.\n\n{}", confirmation(data))
}

pub fn category_corrected(name: &str, data: &ReportData) -> String {
    format!("✅ Category updated to {}.\n\n{}", name, confirmation(data))
}

pub fn missing_field(field: MissingField) -> String {
    let name = match field {
        MissingField::Category => "Category",
        MissingField::Description => "Description",
        MissingField::Location => "Location",
    };
    format!("❌ Error: {} missing. Please type *menu* to start over.", name)
}

pub fn submitted(reference: &str) -> String {
    format!(
        "✅ Report submitted! ID: {}\n\nThank you! Your report will be reviewed.\n\nType *menu* for more options.",
        reference
    )
}

pub fn save_failed() -> String {
    "❌ Error saving report. Please try again by replying *yes*, or type *menu*.".to_string()
}

pub fn cancelled() -> String {
    "Report cancelled. Type *menu* to start a new report.".to_string()
}

pub fn apology() -> String {
    "Sorry, an error occurred. Please try again or type *menu*.".to_string()
}

pub fn no_reports() -> String {
    "📋 You have no reports yet. Type *menu* to report an issue.".to_string()
}

pub fn reports_error() -> String {
    "❌ Error retrieving your reports. Please try again later.".to_string()
}

/// Listing of a user's reports, newest first, capped at [`REPORTS_SHOWN`]
pub fn report_list(reports: &[Report]) -> String {
    if reports.is_empty() {
        return no_reports();
    }

    let mut out = format!("📋 *Your Reports ({}):*\n\n", reports.len());
    for (idx, report) in reports.iter().take(REPORTS_SHOWN).enumerate() {
        let category = match &report.subcategory {
            Some(sub) => format!("{} ({})", report.category, sub),
            None => report.category.clone(),
        };
        out.push_str(&format!("{} *Report {}:*\n", report.status.emoji(), idx + 1));
        out.push_str(&format!("   Category: {}\n", category));
        out.push_str(&format!("   Status: {}\n", report.status.as_str().to_uppercase()));
        out.push_str(&format!("   Location: {}\n", report.location));
        out.push_str(&format!("   Date: {}\n\n", format_date(report.created_at)));
    }
    if reports.len() > REPORTS_SHOWN {
        out.push_str(&format!("... and {} more report(s).\n\n", reports.len() - REPORTS_SHOWN));
    }
    out.push_str("Type *menu* to report a new issue.");
    out
}

fn format_date(epoch_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReportStatus;

    fn report(id: i64, status: ReportStatus) -> Report {
        Report {
            id,
            phone_number: "254700000001".to_string(),
            category: "Infrastructure".to_string(),
            subcategory: Some("Roads".to_string()),
            description: "Pothole".to_string(),
            location: "Nairobi CBD".to_string(),
            evidence_files: Vec::new(),
            status,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_report_list_caps_at_five() {
        let reports: Vec<Report> = (1..=7).map(|id| report(id, ReportStatus::Pending)).collect();
        let text = report_list(&reports);
        assert!(text.starts_with("📋 *Your Reports (7):*"));
        assert!(text.contains("*Report 5:*"));
        assert!(!text.contains("*Report 6:*"));
        assert!(text.contains("... and 2 more report(s)."));
        assert!(text.contains("Category: Infrastructure (Roads)"));
        assert!(text.contains("Date: 2023-11-14"));
    }

    #[test]
    fn test_report_list_status_markers() {
        let text = report_list(&[report(1, ReportStatus::InProgress), report(2, ReportStatus::Resolved)]);
        assert!(text.contains("🔄 *Report 1:*"));
        assert!(text.contains("Status: IN_PROGRESS"));
        assert!(text.contains("✅ *Report 2:*"));
        assert!(!text.contains("more report(s)"));
    }

    #[test]
    fn test_empty_report_list() {
        assert_eq!(report_list(&[]), no_reports());
    }

    #[test]
    fn test_confirmation_summary() {
        let data = ReportData {
            category: Some("Healthcare".to_string()),
            description: Some("No medicine at the clinic".to_string()),
            location: Some("Kisumu".to_string()),
            ..Default::default()
        };
        let text = confirmation(&data);
        assert!(text.starts_with("📝 *Confirm Your Report:*"));
        assert!(text.contains("*Category:* Healthcare"));
        assert!(!text.contains("*Subcategory:*"));
        assert!(text.ends_with("Reply *yes* to submit or *no* to cancel."));
    }

    #[test]
    fn test_missing_field_names_field() {
        assert!(missing_field(MissingField::Location).contains("Location missing"));
    }
}
