//! CLI commands for filingsum

pub mod config;
pub mod dispatch;
pub mod progress;
pub mod summarize;
