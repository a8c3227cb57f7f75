//! Subcommand argument structures

use std::path::PathBuf;

use clap::{Args, Subcommand};
use filingsum_core::pipeline::{FailurePolicy, Strategy};
use filingsum_core::summarizer::SummaryFocus;

use crate::cli::parse::{parse_failure_policy, parse_focus, parse_strategy};

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Company ticker symbol
    pub ticker: String,

    /// SEC form type
    #[arg(long, default_value = "10-K")]
    pub form: String,

    /// Summarize a local filing instead of downloading one
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Processing strategy (sequential, refine, parallel)
    #[arg(long, value_parser = parse_strategy)]
    pub strategy: Option<Strategy>,

    /// What to do when a chunk fails (halt, skip)
    #[arg(long, value_parser = parse_failure_policy)]
    pub failure_policy: Option<FailurePolicy>,

    /// Summary focus (comprehensive, brief, risks, financial)
    #[arg(long, value_parser = parse_focus)]
    pub focus: Option<SummaryFocus>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Worker threads for the parallel strategy
    #[arg(long)]
    pub workers: Option<usize>,

    /// Extra attempts per chunk before the failure policy applies
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Discard saved progress and start over
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Args, Debug)]
pub struct ProgressSubcommand {
    #[command(subcommand)]
    pub command: ProgressCommands,
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommands {
    /// Show the saved progress record
    Show(ProgressKeyArgs),

    /// Delete the saved progress record
    Clear(ProgressKeyArgs),
}

#[derive(Args, Debug)]
pub struct ProgressKeyArgs {
    /// Company ticker symbol
    pub ticker: String,

    /// SEC form type
    #[arg(long, default_value = "10-K")]
    pub form: String,
}
