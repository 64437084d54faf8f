//! Category/subcategory resolution
//!
//! Deterministic matching always runs first: menu number, exact name, then
//! substring in either direction. Only when all of those miss is the
//! generation capability asked, and its answer is mapped back onto the same
//! closed option list. The capability never introduces a new option.

use tracing::{debug, info};

use crate::catalog::{self, CATALOG, Category};
use crate::llm::{Generation, GenerationContext, Generator};
use crate::prompts::PromptContext;

/// Sentinel the classification prompt asks for when nothing fits
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// Shortest input considered for substring matching
const MIN_SUBSTRING_LEN: usize = 3;

const CLASSIFY_MAX_TOKENS: u32 = 20;

/// Keywords proposing a category for free-text issue descriptions
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Healthcare",
        &[
            "hospital", "clinic", "pharmacy", "ambulance", "health", "medical", "doctor", "nurse", "medicine",
            "hospitali", "zahanati", "dawa", "daktari",
        ],
    ),
    (
        "Infrastructure",
        &[
            "road", "bridge", "water", "electricity", "power", "pothole", "street", "highway", "drainage", "sewage",
            "infrastructure", "barabara", "daraja", "maji", "umeme",
        ],
    ),
    (
        "Education",
        &[
            "school", "university", "library", "libraries", "scholarship", "teacher", "student", "education",
            "exam", "shule", "chuo", "mwalimu", "wanafunzi",
        ],
    ),
    (
        "Security",
        &[
            "police", "security", "crime", "emergency", "safety", "theft", "robbery", "violence", "polisi", "wizi",
            "usalama",
        ],
    ),
];

/// Generic words that mark a message as an issue report
const ISSUE_WORDS: &[&str] = &[
    "problem", "issue", "broken", "damaged", "not working", "faulty", "tatizo", "shida",
];

/// What asking the capability produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer<T> {
    Matched(T),
    /// Answered with the sentinel or outside the option list
    Unmatched,
    /// Not configured, failing, or rate limited past its retries
    Unavailable,
}

impl<T> Answer<T> {
    pub fn matched(self) -> Option<T> {
        match self {
            Answer::Matched(value) => Some(value),
            _ => None,
        }
    }

    fn map<U>(self, f: impl FnOnce(T) -> Option<U>) -> Answer<U> {
        match self {
            Answer::Matched(value) => f(value).map_or(Answer::Unmatched, Answer::Matched),
            Answer::Unmatched => Answer::Unmatched,
            Answer::Unavailable => Answer::Unavailable,
        }
    }
}

/// The option list a selection is resolved against
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    Categories,
    Subcategories(&'a Category),
}

impl Scope<'_> {
    /// Options in menu order
    pub fn options(&self) -> Vec<&'static str> {
        match self {
            Scope::Categories => catalog::category_names(),
            Scope::Subcategories(category) => category.subcategories.to_vec(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Categories => "category",
            Scope::Subcategories(_) => "subcategory",
        }
    }
}

/// Steps 1-3: menu number, exact name, substring either way
pub fn match_deterministic(options: &[&'static str], text: &str) -> Option<&'static str> {
    let trimmed = text.trim();
    debug!(%trimmed, option_count = options.len(), "match_deterministic: called");
    if trimmed.is_empty() || options.is_empty() {
        return None;
    }

    if let Ok(n) = trimmed.parse::<usize>() {
        debug!(%n, "match_deterministic: numeric input");
        return n.checked_sub(1).and_then(|idx| options.get(idx)).copied();
    }

    if let Some(hit) = options.iter().find(|o| o.eq_ignore_ascii_case(trimmed)) {
        debug!(%hit, "match_deterministic: exact name");
        return Some(hit);
    }

    let lowered = trimmed.to_lowercase();
    if lowered.chars().count() < MIN_SUBSTRING_LEN {
        debug!("match_deterministic: too short for substring match");
        return None;
    }
    let hit = options.iter().copied().find(|o| {
        let option = o.to_lowercase();
        option.contains(&lowered) || lowered.contains(&option)
    });
    debug!(?hit, "match_deterministic: substring");
    hit
}

/// Map a capability answer back onto the option list
///
/// Rejects the sentinel, accepts an in-range number, then applies the
/// deterministic name rules. Answers like `CATEGORY: Education` are reduced
/// to the part after the colon.
pub fn match_answer(options: &[&'static str], answer: &str) -> Option<&'static str> {
    debug!(%answer, "match_answer: called");
    let first_line = answer.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let value = first_line.rsplit(':').next().unwrap_or(first_line);
    let cleaned = value.trim().trim_matches(|c: char| !c.is_alphanumeric() && c != ' ').trim();

    if cleaned.is_empty() || cleaned.to_uppercase().contains(UNKNOWN_SENTINEL) {
        debug!("match_answer: sentinel or empty");
        return None;
    }
    match_deterministic(options, cleaned)
}

pub(crate) fn words(lowered: &str) -> impl Iterator<Item = &str> {
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
}

pub(crate) fn has_word(lowered: &str, word: &str) -> bool {
    words(lowered).any(|w| w == word)
}

/// Phrase as a whole word or word sequence
pub(crate) fn has_phrase(lowered: &str, phrase: &str) -> bool {
    if phrase.contains(' ') {
        lowered.contains(phrase)
    } else {
        has_word(lowered, phrase)
    }
}

/// Keyword as a whole word, plural included ("pothole", "potholes")
fn has_keyword(lowered: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return lowered.contains(keyword);
    }
    words(lowered).any(|w| w == keyword || w.strip_suffix('s') == Some(keyword))
}

/// Whether free text reads like an issue report
pub fn is_issue_text(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ISSUE_WORDS.iter().any(|w| has_keyword(&lowered, w))
        || CATEGORY_KEYWORDS
            .iter()
            .any(|(_, words)| words.iter().any(|w| has_keyword(&lowered, w)))
}

/// Category with the most keyword hits, if exactly one leads
pub fn keyword_category(text: &str) -> Option<&'static Category> {
    let lowered = text.to_lowercase();
    let scores: Vec<(&str, usize)> = CATEGORY_KEYWORDS
        .iter()
        .map(|(name, words)| (*name, words.iter().filter(|w| has_keyword(&lowered, w)).count()))
        .collect();

    let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
    if best == 0 {
        debug!("keyword_category: no keyword hits");
        return None;
    }
    let mut leaders = scores.iter().filter(|(_, score)| *score == best);
    let (name, _) = leaders.next()?;
    if leaders.next().is_some() {
        debug!(%best, "keyword_category: tie, no deterministic category");
        return None;
    }
    debug!(%name, %best, "keyword_category: matched");
    catalog::find_by_name(name)
}

/// Resolves user selections against the catalog
#[derive(Clone)]
pub struct Resolver {
    generator: Generator,
}

impl Resolver {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    /// Resolve `text` to one option of `scope`
    ///
    /// A capability that is absent, rate limited past its retries, or
    /// answering outside the list yields `None`, never an error.
    pub async fn resolve(&self, scope: Scope<'_>, text: &str) -> Option<&'static str> {
        debug!(kind = scope.kind(), %text, "Resolver::resolve: called");
        let options = scope.options();
        if let Some(hit) = match_deterministic(&options, text) {
            return Some(hit);
        }

        let trimmed = text.trim();
        if options.is_empty() || trimmed.is_empty() || trimmed.parse::<usize>().is_ok() {
            debug!("Resolver::resolve: nothing to ask the capability");
            return None;
        }

        self.ask(scope.kind(), &options, trimmed).await.matched()
    }

    /// Propose a category for a free-text issue description
    ///
    /// Keywords decide first; the capability is asked only when they do not.
    pub async fn classify_issue(&self, text: &str) -> Answer<&'static Category> {
        debug!(%text, "Resolver::classify_issue: called");
        if let Some(category) = keyword_category(text) {
            return Answer::Matched(category);
        }

        let options = catalog::category_names();
        self.ask("category", &options, text.trim())
            .await
            .map(catalog::find_by_name)
    }

    async fn ask(&self, kind: &str, options: &[&'static str], text: &str) -> Answer<&'static str> {
        if !self.generator.is_available() {
            debug!("Resolver::ask: capability unavailable");
            return Answer::Unavailable;
        }

        let ctx = GenerationContext {
            template: "classify",
            prompt: PromptContext::for_classification(kind, options),
            max_tokens: CLASSIFY_MAX_TOKENS,
        };
        match self.generator.generate(&ctx, text).await {
            Generation::Text(answer) => {
                let hit = match_answer(options, &answer);
                info!(%kind, %answer, ?hit, "Capability classification");
                hit.map_or(Answer::Unmatched, Answer::Matched)
            }
            _ => {
                debug!("Resolver::ask: no answer");
                Answer::Unavailable
            }
        }
    }
}

/// Category named in `text`, for corrections like "no, it is education"
pub fn mentioned_category(text: &str) -> Option<&'static Category> {
    let lowered = text.to_lowercase();
    let named = CATALOG.iter().find(|c| {
        let name = c.name.to_lowercase();
        lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .any(|word| word == name)
    });
    if named.is_none() && lowered.contains("health care") {
        return catalog::find_by_name("Healthcare");
    }
    named
}
