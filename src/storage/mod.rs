//! clipcards - Storage module
//!
//! In-memory history of captured clips

pub mod history;

pub use history::{ClipHistory, HistoryEntry};
