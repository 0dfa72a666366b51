//! # relay-memory
//!
//! Per-conversation dialogue memory (bounded, in-process) and the
//! append-only activity log (SQLite) that feeds the control API.

mod log;
mod store;

pub use log::{ActivityLog, Direction, LogEntry, LogRecord};
pub use store::MemoryStore;
