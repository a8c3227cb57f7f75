//! Command trait and context for dispatching commands

use std::time::Instant;

use tracing::debug;

use crate::cli::Cli;
use filingsum_core::config::Config;
use filingsum_core::error::Result;

/// Shared context for command execution
pub struct CommandContext<'a> {
    pub cli: &'a Cli,
    pub start: Instant,
}

impl<'a> CommandContext<'a> {
    pub fn new(cli: &'a Cli, start: Instant) -> Self {
        Self { cli, start }
    }

    /// Load configuration from `--config` or the default location
    pub fn load_config(&self) -> Result<Config> {
        let config = Config::load(self.cli.config.as_deref())?;
        debug!(elapsed = ?self.start.elapsed(), "load_config");
        Ok(config)
    }
}

/// Trait for commands that can be executed
pub trait Command {
    fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// No-op command (when no subcommand is provided)
pub struct NoCommand;

impl Command for NoCommand {
    fn execute(&self, _ctx: &CommandContext) -> Result<()> {
        println!("filingsum {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Summarize SEC filings with a local language model.");
        println!();
        println!("Run `filingsum --help` for usage information.");
        Ok(())
    }
}
