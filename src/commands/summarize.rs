//! `filingsum summarize` command

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{OutputFormat, SummarizeArgs};
use crate::commands::dispatch::CommandContext;
use filingsum_core::config::Config;
use filingsum_core::document::{Document, FilingTextExtractor, TextExtractor};
use filingsum_core::error::{FilingError, Result};
use filingsum_core::inference::{self, Backend};
use filingsum_core::pipeline::{FinalSummary, Pipeline, SummaryOutcome};
use filingsum_core::progress::FileProgressStore;
use filingsum_core::retrieval::{EdgarClient, FilingSource, LocalFileSource};
use filingsum_core::trace_time;

/// Sidecar written next to the summary text
#[derive(Debug, Serialize)]
struct SummaryMetadata<'a> {
    #[serde(flatten)]
    summary: &'a FinalSummary,
    source_file: &'a Path,
    backend: Backend,
    model: &'a str,
    chunk_size: usize,
    overlap: usize,
}

/// Paths of the written summary artifacts
struct Artifacts {
    summary: PathBuf,
    metadata: PathBuf,
}

/// Run the command; in JSON mode every failure is reported as an outcome on stdout
pub fn execute(ctx: &CommandContext, args: &SummarizeArgs) -> Result<()> {
    let result = summarize(ctx, args);
    if let Err(e) = &result {
        print_failure(ctx, e)?;
    }
    result
}

fn summarize(ctx: &CommandContext, args: &SummarizeArgs) -> Result<()> {
    let mut config = ctx.load_config()?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let entity = args.ticker.trim().to_uppercase();
    if entity.is_empty() {
        return Err(FilingError::UsageError("ticker must not be empty".to_string()));
    }

    let source_file = locate_filing(&config, args, &entity)?;
    let document = load_document(&source_file, &entity, &args.form)?;
    trace_time!(ctx.start, "load_document");

    let client = inference::client_from_config(&config.model)?;
    let store = FileProgressStore::new(config.progress_dir());
    let pipeline = Pipeline::new(&config, client, Box::new(store))?;

    if args.fresh {
        let key = pipeline.progress_key(&document);
        if pipeline.store().clear(&key)? {
            info!(key = %key, "discarded saved progress");
        }
    }

    let cancel = pipeline.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst)) {
        debug!(error = %e, "could not install interrupt handler");
    }

    let summary = pipeline.run(&document)?;
    let artifacts = write_artifacts(&config, &summary, &source_file)?;
    print_success(ctx, &summary, &artifacts)
}

fn apply_overrides(config: &mut Config, args: &SummarizeArgs) {
    let pipeline = &mut config.pipeline;
    if let Some(strategy) = args.strategy {
        pipeline.strategy = strategy;
    }
    if let Some(policy) = args.failure_policy {
        pipeline.failure_policy = policy;
    }
    if let Some(focus) = args.focus {
        pipeline.focus = focus;
    }
    if let Some(size) = args.chunk_size {
        pipeline.chunk_size = size;
    }
    if let Some(overlap) = args.overlap {
        pipeline.overlap = overlap;
    }
    if let Some(workers) = args.workers {
        pipeline.workers = workers;
    }
    if let Some(retries) = args.max_retries {
        pipeline.max_retries = retries;
    }
    if let Some(model) = &args.model {
        config.model.name = model.clone();
    }
}

fn locate_filing(config: &Config, args: &SummarizeArgs, entity: &str) -> Result<PathBuf> {
    match &args.file {
        Some(path) => LocalFileSource::new(path).latest_filing(entity, &args.form),
        None => EdgarClient::new(config)?.latest_filing(entity, &args.form),
    }
}

fn load_document(path: &Path, entity: &str, category: &str) -> Result<Document> {
    let extractor = FilingTextExtractor::new()?;
    extractor
        .extract(path)
        .into_document(path, entity, category)
}

fn write_artifacts(config: &Config, summary: &FinalSummary, source_file: &Path) -> Result<Artifacts> {
    let dir = config.output_dir().join(&summary.entity);
    fs::create_dir_all(&dir)
        .map_err(|e| FilingError::io_operation("create output directory", dir.display(), e))?;

    let stem = format!("{}_{}_summary", summary.entity, summary.category);
    let artifacts = Artifacts {
        summary: dir.join(format!("{stem}.txt")),
        metadata: dir.join(format!("{stem}_metadata.json")),
    };

    fs::write(&artifacts.summary, &summary.summary).map_err(|e| {
        FilingError::io_operation("write summary", artifacts.summary.display(), e)
    })?;

    let metadata = SummaryMetadata {
        summary,
        source_file,
        backend: config.model.backend,
        model: &config.model.name,
        chunk_size: config.pipeline.chunk_size,
        overlap: config.pipeline.overlap,
    };
    let mut json = serde_json::to_value(&metadata)?;
    if let Some(object) = json.as_object_mut() {
        object.remove("summary");
    }
    fs::write(&artifacts.metadata, serde_json::to_string_pretty(&json)?).map_err(|e| {
        FilingError::io_operation("write summary metadata", artifacts.metadata.display(), e)
    })?;

    info!(path = %artifacts.summary.display(), "summary saved");
    Ok(artifacts)
}

fn print_success(ctx: &CommandContext, summary: &FinalSummary, artifacts: &Artifacts) -> Result<()> {
    match ctx.cli.format {
        OutputFormat::Json => {
            let mut json = serde_json::to_value(SummaryOutcome::Success(summary.clone()))?;
            json["summary_file"] = artifacts.summary.display().to_string().into();
            json["metadata_file"] = artifacts.metadata.display().to_string().into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Human => {
            println!("{}", summary.summary);
            if !ctx.cli.quiet {
                eprintln!();
                eprintln!(
                    "{} {}: {} chunks ({} resumed, {} skipped) in {:.1}s",
                    summary.entity,
                    summary.category,
                    summary.chunks_processed,
                    summary.chunks_resumed,
                    summary.chunks_skipped,
                    summary.duration_secs
                );
                eprintln!("Saved to {}", artifacts.summary.display());
            }
        }
    }
    Ok(())
}

fn print_failure(ctx: &CommandContext, error: &FilingError) -> Result<()> {
    match ctx.cli.format {
        OutputFormat::Json => {
            let outcome = SummaryOutcome::Error(error.into());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Human => {
            if error.is_resumable() && !ctx.cli.quiet {
                if let Some(completed) = error.chunks_completed() {
                    eprintln!(
                        "{} chunk summaries are saved; re-run the same command to resume.",
                        completed
                    );
                }
            }
        }
    }
    Ok(())
}
