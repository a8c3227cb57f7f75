//! Resumable chunked summarization
//!
//! The orchestrator walks the chunks of a document in order, skipping those
//! already present in the progress record, persists every new partial summary
//! before moving on, and finally reduces the partials to one narrative.
//!
//! Strategies:
//! - `sequential`: one chunk at a time, each summarized independently
//! - `refine`: one chunk at a time, each call refines the evolving summary
//! - `parallel`: a bounded pool of workers; the record is a whole-document cache

mod outcome;
mod parallel;
mod state;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunker::{Chunk, Chunker};
use crate::config::{Config, PipelineConfig};
use crate::document::Document;
use crate::error::{FilingError, Result};
use crate::inference::{InferenceClient, InferenceError};
use crate::progress::{ProgressKey, ProgressStore};
use crate::summarizer::{ChunkSummarizer, Reducer, SynthesisReducer};
use crate::trace_time;

pub use outcome::{FailureReport, FinalSummary, SummaryOutcome};
pub use state::PipelineState;
use state::StateTracker;

/// How chunks are processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Sequential,
    Refine,
    Parallel,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Refine => "refine",
            Strategy::Parallel => "parallel",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequential" | "map-reduce" => Ok(Strategy::Sequential),
            "refine" => Ok(Strategy::Refine),
            "parallel" => Ok(Strategy::Parallel),
            other => Err(FilingError::invalid_value("strategy", other)),
        }
    }
}

/// What happens when a chunk cannot be summarized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the run; a re-run resumes at the failed chunk
    #[default]
    Halt,
    /// Record an empty gap and continue
    Skip,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Halt => f.write_str("halt"),
            FailurePolicy::Skip => f.write_str("skip"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "halt" => Ok(FailurePolicy::Halt),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(FilingError::invalid_value("failure policy", other)),
        }
    }
}

/// Summarizes documents with durable per-chunk progress
pub struct Pipeline {
    settings: PipelineConfig,
    chunker: Chunker,
    summarizer: ChunkSummarizer,
    reducer: Box<dyn Reducer>,
    store: Box<dyn ProgressStore>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        client: Arc<dyn InferenceClient>,
        store: Box<dyn ProgressStore>,
    ) -> Result<Self> {
        let settings = config.pipeline.clone();
        let chunker = Chunker::new(settings.chunk_size, settings.overlap)?;
        let summarizer = ChunkSummarizer::new(client.clone(), &config.model, settings.focus);
        let reducer = Box::new(SynthesisReducer::new(client, &config.model, settings.focus));

        Ok(Self {
            settings,
            chunker,
            summarizer,
            reducer,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the default synthesis reducer
    pub fn with_reducer(mut self, reducer: Box<dyn Reducer>) -> Self {
        self.reducer = reducer;
        self
    }

    /// Share a cancellation flag; the run stops before the next chunk once set
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn store(&self) -> &dyn ProgressStore {
        self.store.as_ref()
    }

    /// Progress key for `document` under this pipeline's chunking parameters
    pub fn progress_key(&self, document: &Document) -> ProgressKey {
        ProgressKey::new(&document.entity, &document.category)
            .with_fingerprint(document.fingerprint(&self.chunker, &self.record_mode()))
    }

    /// What a record entry holds under these settings.
    ///
    /// Refine entries are cumulative, map entries summarize one chunk each, so
    /// the two never share a record. Sequential and parallel runs do.
    fn record_mode(&self) -> String {
        let kind = match self.settings.strategy {
            Strategy::Refine => "refine",
            Strategy::Sequential | Strategy::Parallel => "map",
        };
        format!("{kind}/{}", self.settings.focus.as_str())
    }

    /// Summarize a document, resuming from any matching progress record
    pub fn run(&self, document: &Document) -> Result<FinalSummary> {
        let start = Instant::now();
        let mut state = StateTracker::new();

        let result = self.execute(document, &mut state, start);
        if let Err(e) = &result {
            warn!(
                entity = %document.entity,
                category = %document.category,
                state = %state.current(),
                error = %e,
                "summarization failed"
            );
            state.advance(PipelineState::Failed);
        }
        result
    }

    fn execute(
        &self,
        document: &Document,
        state: &mut StateTracker,
        start: Instant,
    ) -> Result<FinalSummary> {
        if document.is_blank() {
            return Err(FilingError::NoContent {
                entity: document.entity.clone(),
                category: document.category.clone(),
            });
        }

        let chunks: Vec<Chunk<'_>> = self.chunker.split(&document.text).collect();
        let total = chunks.len();
        let key = self.progress_key(document);
        info!(
            entity = %document.entity,
            category = %document.category,
            chars = document.text.chars().count(),
            chunks = total,
            strategy = %self.settings.strategy,
            "starting summarization"
        );

        state.advance(PipelineState::Resuming);
        let existing = self.resume(&key, total)?;
        let resumed = existing.len();
        if resumed > 0 {
            info!(resumed, total, entity = %key.entity, "resuming from progress record");
        }

        let summaries = match self.settings.strategy {
            Strategy::Parallel => parallel::map_chunks(self, &key, &chunks, existing, state)?,
            Strategy::Sequential | Strategy::Refine => {
                self.map_sequential(&key, &chunks, existing, state)?
            }
        };

        state.advance(PipelineState::Reducing);
        let summary = self.reduce(&document.entity, &summaries)?;
        state.advance(PipelineState::Done);

        if !self.settings.keep_progress {
            self.store.clear(&key)?;
        }
        trace_time!(start, "pipeline_run", chunks = total);

        Ok(FinalSummary {
            entity: document.entity.clone(),
            category: document.category.clone(),
            summary,
            duration_secs: start.elapsed().as_secs_f64(),
            chunks_processed: total,
            chunks_resumed: resumed,
            chunks_skipped: summaries.iter().filter(|s| s.is_empty()).count(),
            strategy: self.settings.strategy,
            generated_at: Utc::now(),
        })
    }

    /// Load the record, discarding one written for a different document
    fn resume(&self, key: &ProgressKey, total: usize) -> Result<Vec<String>> {
        let record = self.store.load(key)?;
        if record.is_stale_for(key) || record.len() > total {
            warn!(
                key = %key,
                entries = record.len(),
                location = %self.store.location(key),
                "discarding progress recorded for a different document"
            );
            self.store.clear(key)?;
            return Ok(Vec::new());
        }
        Ok(record.summaries)
    }

    fn map_sequential(
        &self,
        key: &ProgressKey,
        chunks: &[Chunk<'_>],
        mut summaries: Vec<String>,
        state: &mut StateTracker,
    ) -> Result<Vec<String>> {
        let total = chunks.len();
        let refine = self.settings.strategy == Strategy::Refine;

        for chunk in &chunks[summaries.len()..] {
            self.check_cancelled(summaries.len(), total)?;
            state.advance(PipelineState::Processing(chunk.index));
            info!(chunk = chunk.index + 1, total, entity = %key.entity, "summarizing chunk");

            let context = if refine { latest_summary(&summaries) } else { None };
            let summary = match self.summarize_with_retry(chunk, &key.entity, context) {
                Ok(summary) => summary,
                Err(source) => {
                    self.apply_failure_policy(chunk.index, total, summaries.len(), source)?
                }
            };

            self.store.append(key, &summary)?;
            summaries.push(summary);
        }

        Ok(summaries)
    }

    fn summarize_with_retry(
        &self,
        chunk: &Chunk<'_>,
        entity: &str,
        context: Option<&str>,
    ) -> std::result::Result<String, InferenceError> {
        let start = Instant::now();
        let mut attempt = 0;
        loop {
            match self.summarizer.summarize_chunk(chunk.text, entity, context) {
                Ok(summary) => {
                    trace_time!(start, "summarize_chunk", chunk = chunk.index);
                    return Ok(summary);
                }
                Err(e) if attempt < self.settings.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2_u64.pow((attempt - 1).min(10)));
                    warn!(chunk = chunk.index, attempt, error = %e, ?backoff, "retrying chunk");
                    thread::sleep(backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Halt with a resumable error, or record an empty gap
    fn apply_failure_policy(
        &self,
        index: usize,
        total: usize,
        completed: usize,
        source: InferenceError,
    ) -> Result<String> {
        match self.settings.failure_policy {
            FailurePolicy::Halt => Err(FilingError::ChunkFailed {
                chunk: index,
                total,
                completed,
                source,
            }),
            FailurePolicy::Skip => {
                warn!(chunk = index, error = %source, "skipping chunk");
                Ok(String::new())
            }
        }
    }

    fn check_cancelled(&self, completed: usize, total: usize) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            info!(completed, total, "summarization interrupted, progress saved");
            return Err(FilingError::Interrupted { completed, total });
        }
        Ok(())
    }

    fn reduce(&self, entity: &str, summaries: &[String]) -> Result<String> {
        let completed = summaries.len();
        if summaries.iter().all(|s| s.trim().is_empty()) {
            return Err(FilingError::NoChunksSummarized { total: completed });
        }

        // The evolving summary already covers the whole document
        if self.settings.strategy == Strategy::Refine {
            return Ok(latest_summary(summaries)
                .map(str::to_string)
                .unwrap_or_default());
        }

        let start = Instant::now();
        info!(partials = completed, entity, "synthesizing final summary");
        let summary = self
            .reducer
            .reduce(entity, summaries)
            .map_err(|source| FilingError::ReductionFailed { completed, source })?;
        trace_time!(start, "reduce");
        Ok(summary)
    }
}

/// Most recent non-gap summary
fn latest_summary(summaries: &[String]) -> Option<&str> {
    summaries
        .iter()
        .rev()
        .find(|s| !s.trim().is_empty())
        .map(String::as_str)
}
