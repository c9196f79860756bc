//! CLI command handlers.

pub mod detect;
pub mod report;
