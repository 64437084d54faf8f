//! Fixed category catalog
//!
//! The taxonomy is compiled in and never changes at runtime; every
//! classification path resolves against these entries.

use tracing::debug;

/// One catalog entry: a top-level category and its ordered subcategories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Menu key shown to the user ("1".."5")
    pub key: &'static str,
    pub name: &'static str,
    pub subcategories: &'static [&'static str],
}

impl Category {
    /// Whether this category asks for a subcategory
    pub fn has_subcategories(&self) -> bool {
        !self.subcategories.is_empty()
    }

    /// Report-id prefix, e.g. "INF" for Infrastructure
    pub fn id_prefix(&self) -> String {
        self.name.chars().take(3).collect::<String>().to_uppercase()
    }
}

pub const CATALOG: &[Category] = &[
    Category {
        key: "1",
        name: "Healthcare",
        subcategories: &["Hospital", "Clinic", "Pharmacy", "Ambulance"],
    },
    Category {
        key: "2",
        name: "Infrastructure",
        subcategories: &["Roads", "Bridges", "Water Supply", "Electricity"],
    },
    Category {
        key: "3",
        name: "Education",
        subcategories: &["School", "University", "Library", "Scholarship"],
    },
    Category {
        key: "4",
        name: "Security",
        subcategories: &["Police", "Emergency", "Safety", "Crime"],
    },
    Category {
        key: "5",
        name: "Other",
        subcategories: &[],
    },
];

/// Look up a category by its exact (case-insensitive) name
pub fn find_by_name(name: &str) -> Option<&'static Category> {
    debug!(%name, "find_by_name: called");
    CATALOG.iter().find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Category names in menu order
pub fn category_names() -> Vec<&'static str> {
    CATALOG.iter().map(|c| c.name).collect()
}

/// Whether `subcategory` belongs to the named category
pub fn is_valid_subcategory(category: &str, subcategory: &str) -> bool {
    find_by_name(category)
        .map(|c| c.subcategories.iter().any(|s| s.eq_ignore_ascii_case(subcategory)))
        .unwrap_or(false)
}

/// Numbered menu lines ("1. Healthcare\n2. ...")
pub fn numbered(options: &[&str]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("{}. {}", idx + 1, name))
        .collect::<Vec<_>>()
        .join("\n")
}
