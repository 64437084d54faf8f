//! TrustBridge - conversational issue reporting
//!
//! Citizens report problems with public services through a short guided
//! conversation: pick (or describe) a category, describe the issue, give a
//! location, optionally attach evidence, confirm. Each message advances a
//! per-sender state machine whose session is persisted between turns.
//!
//! # Core Concepts
//!
//! - **Deterministic first**: menus, numbers and keywords are matched
//!   locally; the generation capability is only asked when they fail
//! - **Always answer**: a missing, throttled or failing capability degrades
//!   to fixed replies, never to an error
//! - **Admission control**: every generation call waits for a dispatcher
//!   ticket that keeps the provider under its request budget
//!
//! # Modules
//!
//! - [`engine`] - Conversation state machine
//! - [`resolver`] - Category and subcategory resolution
//! - [`dispatcher`] - Rate-limited admission for generation calls
//! - [`llm`] - Capability clients and the dispatcher-gated generator
//! - [`state`] - Session and report gateways
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod engine;
pub mod evidence;
pub mod language;
pub mod llm;
pub mod prompts;
pub mod resolver;
pub mod state;

// Re-export commonly used types
pub use config::{Config, ConversationConfig, DispatcherConfig, LlmConfig};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use domain::{ConversationState, EvidenceFile, Report, ReportData, ReportStatus, Session};
pub use engine::ConversationEngine;
pub use llm::{Generation, Generator, LlmClient, LlmError};
pub use resolver::{Resolver, Scope};
pub use state::{MemoryGateway, ReportGateway, SessionGateway, StateError, StateManager, StateResponse};
