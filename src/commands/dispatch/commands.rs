//! Command implementations for all filingsum commands

use crate::cli::{Commands, ProgressCommands};
use crate::commands::dispatch::command::{Command, CommandContext};
use crate::commands::{config, progress, summarize};
use filingsum_core::error::Result;

impl Command for Commands {
    fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            Commands::Summarize(args) => summarize::execute(ctx, args),
            Commands::Progress(sub) => match &sub.command {
                ProgressCommands::Show(key) => progress::show(ctx, key),
                ProgressCommands::Clear(key) => progress::clear(ctx, key),
            },
            Commands::Config => config::execute(ctx),
        }
    }
}
