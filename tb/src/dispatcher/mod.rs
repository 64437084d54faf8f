//! Admission-controlled dispatcher for the generation capability
//!
//! Gates timing only; the capability call itself is made by the caller
//! once its ticket is released.

mod core;
mod window;

pub use core::{Dispatcher, DispatcherClosed, DispatcherStats, Ticket};
pub use window::RateWindow;
