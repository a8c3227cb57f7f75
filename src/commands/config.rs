//! `filingsum config` command

use crate::cli::OutputFormat;
use crate::commands::dispatch::CommandContext;
use filingsum_core::error::Result;

/// Print the resolved configuration
pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = ctx.load_config()?;
    match ctx.cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Human => print!("{}", config.to_toml()?),
    }
    Ok(())
}
