//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the generation
//! capability.
//!
//! Template loading chain:
//! 1. `.trustbridge/prompts/{name}.pmt` (user override)
//! 2. Embedded copy of `tb/prompts/{name}.pmt`
//!
//! Templates use Handlebars syntax for variable substitution.

pub mod embedded;
mod loader;

pub use loader::{PromptContext, PromptLine, PromptLoader, ReplyStage};
