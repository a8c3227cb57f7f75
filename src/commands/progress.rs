//! `filingsum progress` commands

use serde_json::json;

use crate::cli::{OutputFormat, ProgressKeyArgs};
use crate::commands::dispatch::CommandContext;
use filingsum_core::error::Result;
use filingsum_core::progress::{FileProgressStore, ProgressKey, ProgressStore};

fn open(ctx: &CommandContext, args: &ProgressKeyArgs) -> Result<(FileProgressStore, ProgressKey)> {
    let config = ctx.load_config()?;
    let store = FileProgressStore::new(config.progress_dir());
    let key = ProgressKey::new(args.ticker.trim().to_uppercase(), args.form.clone());
    Ok((store, key))
}

/// Show the saved progress record for a filing
pub fn show(ctx: &CommandContext, args: &ProgressKeyArgs) -> Result<()> {
    let (store, key) = open(ctx, args)?;
    let record = store.load(&key)?;
    let location = store.location(&key);

    match ctx.cli.format {
        OutputFormat::Json => {
            let output = json!({
                "entity": key.entity,
                "category": key.category,
                "entries": record.len(),
                "gaps": record.gap_count(),
                "fingerprint": record.fingerprint,
                "updated_at": record.updated_at,
                "location": location,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            if record.is_empty() {
                println!("No progress recorded for {}", key);
                return Ok(());
            }
            println!(
                "{}: {} chunk summaries ({} gaps)",
                key,
                record.len(),
                record.gap_count()
            );
            if let Some(updated_at) = record.updated_at {
                println!("  updated:     {}", updated_at.to_rfc3339());
            }
            if let Some(fingerprint) = &record.fingerprint {
                println!("  fingerprint: {}", fingerprint);
            }
            println!("  location:    {}", location);
        }
    }
    Ok(())
}

/// Delete the saved progress record for a filing
pub fn clear(ctx: &CommandContext, args: &ProgressKeyArgs) -> Result<()> {
    let (store, key) = open(ctx, args)?;
    let cleared = store.clear(&key)?;

    match ctx.cli.format {
        OutputFormat::Json => {
            let output = json!({
                "entity": key.entity,
                "category": key.category,
                "cleared": cleared,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Human => {
            if cleared {
                println!("Cleared progress for {}", key);
            } else if !ctx.cli.quiet {
                println!("No progress recorded for {}", key);
            }
        }
    }
    Ok(())
}
