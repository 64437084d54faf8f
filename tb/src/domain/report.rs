//! Issue report types
//!
//! A report can only be built from session data through
//! [`ReportDraft::from_report_data`], which refuses partial data.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::session::{EvidenceFile, ReportData};
use crate::catalog;

/// Review status of a filed report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    /// Marker used when listing reports
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Pending => "⏳",
            Self::InProgress => "🔄",
            Self::Resolved => "✅",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "ReportStatus::from_str: called");
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!(
                "Unknown report status: '{}'. Expected pending, in_progress or resolved",
                other
            )),
        }
    }
}

/// A required field absent at confirmation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MissingField {
    #[error("category")]
    Category,
    #[error("description")]
    Description,
    #[error("location")]
    Location,
}

/// Validated fields for a new report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDraft {
    pub phone_number: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub location: String,
    pub evidence_files: Vec<EvidenceFile>,
}

impl ReportDraft {
    /// Build a draft, failing on the first missing required field
    ///
    /// Checks run in category, description, location order. A subcategory
    /// that does not belong to the category is dropped.
    pub fn from_report_data(phone_number: &str, data: &ReportData) -> Result<Self, MissingField> {
        debug!(%phone_number, "ReportDraft::from_report_data: called");
        let category = non_empty(&data.category).ok_or(MissingField::Category)?;
        let description = non_empty(&data.description).ok_or(MissingField::Description)?;
        let location = non_empty(&data.location).ok_or(MissingField::Location)?;

        let subcategory = data
            .subcategory
            .as_deref()
            .filter(|sub| catalog::is_valid_subcategory(category, sub))
            .map(str::to_string);

        Ok(Self {
            phone_number: phone_number.to_string(),
            category: category.to_string(),
            subcategory,
            description: description.to_string(),
            location: location.to_string(),
            evidence_files: data.evidence_files.clone(),
        })
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A filed report as returned by the report gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub phone_number: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    pub location: String,
    pub evidence_files: Vec<EvidenceFile>,
    pub status: ReportStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Human-readable reference: category prefix plus the last six digits of the clock
pub fn report_reference(category: &str, now_ms: i64) -> String {
    let prefix = catalog::find_by_name(category)
        .map(|c| c.id_prefix())
        .unwrap_or_else(|| category.chars().take(3).collect::<String>().to_uppercase());
    format!("{}-{:06}", prefix, now_ms.rem_euclid(1_000_000))
}
