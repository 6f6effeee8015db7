//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Config, store and engine setup shared by every command, plus `load`
//! - `insight` - Insight generation and backend status commands
//! - `query` - Ad-hoc read query command
//! - `reports` - Report listing and generation commands

pub mod core;
pub mod insight;
pub mod query;
pub mod reports;

// Re-export command functions for main.rs
pub use core::*;
pub use insight::*;
pub use query::*;
pub use reports::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
