//! CLI argument parsing for filingsum
//!
//! Global flags: --config, --format, --quiet, --verbose, --log-level, --log-json

pub mod args;
pub mod output;
pub mod parse;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{ProgressCommands, ProgressKeyArgs, ProgressSubcommand, SummarizeArgs};
pub use output::OutputFormat;

/// Filingsum - summarize SEC filings with a local language model
#[derive(Parser, Debug)]
#[command(name = "filingsum")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ~/.config/filingsum/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Log progress and timing to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log level or filter directive (e.g. debug, filingsum_core=trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Whether the command reports its own failures on stdout
    pub fn reports_failures(&self) -> bool {
        self.format == OutputFormat::Json && matches!(self.command, Some(Commands::Summarize(_)))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize the latest filing of a company
    Summarize(SummarizeArgs),

    /// Inspect or remove saved chunk progress
    Progress(ProgressSubcommand),

    /// Print the resolved configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use filingsum_core::pipeline::{FailurePolicy, Strategy};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_summarize_flags() {
        let cli = Cli::try_parse_from([
            "filingsum",
            "--format",
            "json",
            "summarize",
            "aapl",
            "--form",
            "10-Q",
            "--strategy",
            "parallel",
            "--failure-policy",
            "skip",
            "--fresh",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Some(Commands::Summarize(args)) => {
                assert_eq!(args.ticker, "aapl");
                assert_eq!(args.form, "10-Q");
                assert_eq!(args.strategy, Some(Strategy::Parallel));
                assert_eq!(args.failure_policy, Some(FailurePolicy::Skip));
                assert!(args.fresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let result = Cli::try_parse_from(["filingsum", "summarize", "AAPL", "--strategy", "magic"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_only_json_summarize_reports_its_own_failures() {
        let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap();

        assert!(parse(&["filingsum", "--format", "json", "summarize", "AAPL"]).reports_failures());
        assert!(!parse(&["filingsum", "summarize", "AAPL"]).reports_failures());
        assert!(!parse(&["filingsum", "--format", "json", "progress", "show", "AAPL"])
            .reports_failures());
    }

    #[test]
    fn test_progress_defaults_to_annual_report() {
        let cli = Cli::try_parse_from(["filingsum", "progress", "show", "MSFT"]).unwrap();
        match cli.command {
            Some(Commands::Progress(sub)) => match sub.command {
                ProgressCommands::Show(key) => assert_eq!(key.form, "10-K"),
                other => panic!("unexpected subcommand: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
