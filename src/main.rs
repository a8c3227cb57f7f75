//! Filingsum - summarize SEC filings with a local language model
//!
//! Downloads a company's latest filing, extracts its readable text and
//! produces one narrative summary through a chunked, resumable pipeline.

mod cli;
mod commands;

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use cli::{Cli, OutputFormat};
use filingsum_core::error::FilingError;
use filingsum_core::logging;

fn main() -> ExitCode {
    let start = Instant::now();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(err),
    };

    if let Err(e) = logging::init_tracing(cli.verbose, cli.log_level.as_deref(), cli.log_json) {
        eprintln!("warning: logging disabled: {e}");
    }
    tracing::debug!(elapsed = ?start.elapsed(), "parse_args");

    match commands::dispatch::run(&cli, start) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_failure(&cli, &e);
            exit_status(&e)
        }
    }
}

/// Argument errors exit 2; with `--format json` they are reported as an
/// error envelope since `Cli.format` was never parsed.
fn parse_failure(err: clap::Error) -> ExitCode {
    if !err.use_stderr() || !json_requested(env::args().skip(1)) {
        err.exit();
    }
    let error = FilingError::UsageError(err.to_string());
    eprintln!("{}", error.to_json());
    exit_status(&error)
}

fn report_failure(cli: &Cli, error: &FilingError) {
    if cli.reports_failures() {
        return;
    }
    match cli.format {
        OutputFormat::Json => eprintln!("{}", error.to_json()),
        OutputFormat::Human if !cli.quiet => eprintln!("error: {error}"),
        OutputFormat::Human => {}
    }
}

fn exit_status(error: &FilingError) -> ExitCode {
    ExitCode::from(error.exit_code() as u8)
}

fn json_requested(args: impl IntoIterator<Item = String>) -> bool {
    let args: Vec<String> = args.into_iter().collect();
    args.iter().any(|a| a == "--format=json")
        || args.windows(2).any(|w| w[0] == "--format" && w[1] == "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_json_requested_in_either_spelling() {
        assert!(json_requested(args(&["--format", "json", "summarize"])));
        assert!(json_requested(args(&["summarize", "--format=json"])));
        assert!(!json_requested(args(&["--format", "human", "json"])));
        assert!(!json_requested(args(&["--format"])));
    }
}
