//! State management with actor pattern
//!
//! StateManager owns the report store and processes messages via channels,
//! providing thread-safe access to sessions and reports. The conversation
//! engine only sees the gateway traits.

mod gateway;
mod manager;
mod memory;
mod messages;

pub use gateway::{ReportGateway, SessionGateway};
pub use manager::StateManager;
pub use memory::MemoryGateway;
pub use messages::{StateCommand, StateError, StateResponse};
