//! Command handlers for the career mentor CLI.
//!
//! Each command consumes one public engine operation.

pub mod add;
pub mod reset;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use add::AddCommand;
pub use reset::ResetCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
