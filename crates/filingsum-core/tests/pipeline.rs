//! Integration tests for the resumable summarization pipeline

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use filingsum_core::config::Config;
use filingsum_core::document::Document;
use filingsum_core::error::FilingError;
use filingsum_core::inference::{InferenceClient, InferenceError, InferenceRequest};
use filingsum_core::pipeline::{FailurePolicy, Pipeline, Strategy, SummaryOutcome};
use filingsum_core::progress::{
    FileProgressStore, MemoryProgressStore, ProgressKey, ProgressStore,
};
use filingsum_core::summarizer::{Reducer, SummaryFocus};
use tempfile::tempdir;

const PART_CHARS: usize = 1000;

// ============================================================================
// Test doubles
// ============================================================================

/// Replies `S<part>` for each chunk and `FINAL` for anything else
#[derive(Default)]
struct PartClient {
    prompts: Mutex<Vec<String>>,
    /// Remaining failures per part
    failures: Mutex<HashMap<usize, u32>>,
    /// Raise this flag once the given part has been summarized
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl PartClient {
    fn failing(parts: &[(usize, u32)]) -> Self {
        Self {
            failures: Mutex::new(parts.iter().copied().collect()),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn parts_called(&self) -> Vec<usize> {
        let mut parts: Vec<usize> = self
            .prompts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|p| part_of(p))
            .collect();
        parts.sort_unstable();
        parts
    }
}

impl InferenceClient for PartClient {
    fn infer(&self, request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        let Some(part) = part_of(request.prompt) else {
            return Ok("FINAL".to_string());
        };

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&part) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(InferenceError::Unavailable {
                    url: "stub".to_string(),
                    reason: format!("part {part} refused"),
                });
            }
        }

        if let Some((after, flag)) = &self.cancel_after {
            if *after == part {
                flag.store(true, Ordering::SeqCst);
            }
        }
        Ok(format!("S{part}"))
    }
}

/// Replies `S<n>` where `n` counts calls
#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
}

impl InferenceClient for CountingClient {
    fn infer(&self, _request: &InferenceRequest<'_>) -> Result<String, InferenceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("S{n}"))
    }
}

/// Joins non-empty partials with `|` and remembers what it was given
#[derive(Clone, Default)]
struct JoinReducer {
    seen: Arc<Mutex<Vec<Vec<String>>>>,
    fail: bool,
}

impl JoinReducer {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Reducer for JoinReducer {
    fn reduce(&self, _entity: &str, partials: &[String]) -> Result<String, InferenceError> {
        self.seen.lock().unwrap().push(partials.to_vec());
        if self.fail {
            return Err(InferenceError::Timeout(std::time::Duration::from_secs(1)));
        }
        Ok(partials
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("|"))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn part_of(prompt: &str) -> Option<usize> {
    let start = prompt.find("[part ")? + "[part ".len();
    let end = start + prompt[start..].find(']')?;
    prompt[start..end].parse().ok()
}

/// A document whose chunks are exactly one tagged part each
fn document(parts: usize) -> Document {
    let text: String = (0..parts)
        .map(|i| {
            let tag = format!("[part {i}]");
            let filler = "x".repeat(PART_CHARS - tag.len());
            format!("{tag}{filler}")
        })
        .collect();
    Document::new("ACME", "10-K", text)
}

fn config(strategy: Strategy) -> Config {
    let mut config = Config::default();
    config.pipeline.chunk_size = PART_CHARS;
    config.pipeline.overlap = 0;
    config.pipeline.strategy = strategy;
    config
}

fn pipeline(
    config: &Config,
    client: Arc<dyn InferenceClient>,
    store: impl ProgressStore + 'static,
    reducer: &JoinReducer,
) -> Pipeline {
    Pipeline::new(config, client, Box::new(store))
        .unwrap()
        .with_reducer(Box::new(reducer.clone()))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Resumption
// ============================================================================

#[test]
fn test_resume_only_summarizes_remaining_chunks() {
    let dir = tempdir().unwrap();
    let doc = document(5);
    let reducer = JoinReducer::default();
    // Chunks 0 and 1 must never be summarized again
    let client = Arc::new(PartClient::failing(&[(0, u32::MAX), (1, u32::MAX)]));
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        client.clone(),
        FileProgressStore::new(dir.path()),
        &reducer,
    );

    let key = pipeline.progress_key(&doc);
    pipeline.store().append(&key, "S0").unwrap();
    pipeline.store().append(&key, "S1").unwrap();

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(client.parts_called(), vec![2, 3, 4]);
    assert_eq!(summary.summary, "S0|S1|S2|S3|S4");
    assert_eq!(summary.chunks_processed, 5);
    assert_eq!(summary.chunks_resumed, 2);
    assert_eq!(
        pipeline.store().load(&key).unwrap().summaries,
        strings(&["S0", "S1", "S2", "S3", "S4"])
    );
}

#[test]
fn test_halted_run_resumes_at_failed_chunk() {
    let dir = tempdir().unwrap();
    let doc = document(5);
    let config = config(Strategy::Sequential);
    let reducer = JoinReducer::default();

    let first = Arc::new(PartClient::failing(&[(2, u32::MAX)]));
    let run = pipeline(&config, first.clone(), FileProgressStore::new(dir.path()), &reducer);
    let err = run.run(&doc).unwrap_err();

    match &err {
        FilingError::ChunkFailed {
            chunk,
            total,
            completed,
            ..
        } => {
            assert_eq!((*chunk, *total, *completed), (2, 5, 2));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_resumable());
    assert_eq!(reducer.calls(), 0);
    let key = run.progress_key(&doc);
    assert_eq!(run.store().load(&key).unwrap().summaries, strings(&["S0", "S1"]));

    let second = Arc::new(PartClient::default());
    let rerun = pipeline(&config, second.clone(), FileProgressStore::new(dir.path()), &reducer);
    let summary = rerun.run(&doc).unwrap();

    assert_eq!(second.parts_called(), vec![2, 3, 4]);
    assert_eq!(summary.chunks_resumed, 2);
    assert_eq!(summary.summary, "S0|S1|S2|S3|S4");
}

#[test]
fn test_switching_to_refine_discards_map_record() {
    let dir = tempdir().unwrap();
    let doc = document(4);
    let reducer = JoinReducer::default();

    let first = Arc::new(PartClient::failing(&[(2, u32::MAX)]));
    let halted = pipeline(
        &config(Strategy::Sequential),
        first.clone(),
        FileProgressStore::new(dir.path()),
        &reducer,
    );
    assert!(halted.run(&doc).is_err());
    let map_key = halted.progress_key(&doc);
    assert_eq!(halted.store().load(&map_key).unwrap().summaries, strings(&["S0", "S1"]));

    let second = Arc::new(PartClient::default());
    let refine = pipeline(
        &config(Strategy::Refine),
        second.clone(),
        FileProgressStore::new(dir.path()),
        &reducer,
    );
    assert_ne!(refine.progress_key(&doc).fingerprint, map_key.fingerprint);

    let summary = refine.run(&doc).unwrap();

    assert_eq!(second.parts_called(), vec![0, 1, 2, 3]);
    assert_eq!(summary.chunks_resumed, 0);
    assert_eq!(summary.summary, "S3");
    let prompts = second.prompts.lock().unwrap();
    assert!(!prompts[0].contains("EXISTING SUMMARY"));
}

#[test]
fn test_focus_change_discards_record() {
    let dir = tempdir().unwrap();
    let doc = document(3);
    let reducer = JoinReducer::default();

    let first = Arc::new(PartClient::failing(&[(1, u32::MAX)]));
    let halted = pipeline(
        &config(Strategy::Sequential),
        first,
        FileProgressStore::new(dir.path()),
        &reducer,
    );
    assert!(halted.run(&doc).is_err());

    let mut risks = config(Strategy::Sequential);
    risks.pipeline.focus = SummaryFocus::Risks;
    let second = Arc::new(PartClient::default());
    let rerun = pipeline(&risks, second.clone(), FileProgressStore::new(dir.path()), &reducer);
    let summary = rerun.run(&doc).unwrap();

    assert_eq!(second.parts_called(), vec![0, 1, 2]);
    assert_eq!(summary.chunks_resumed, 0);
}

#[test]
fn test_parallel_resumes_sequential_record() {
    let dir = tempdir().unwrap();
    let doc = document(4);
    let reducer = JoinReducer::default();

    let first = Arc::new(PartClient::failing(&[(2, u32::MAX)]));
    let halted = pipeline(
        &config(Strategy::Sequential),
        first,
        FileProgressStore::new(dir.path()),
        &reducer,
    );
    assert!(halted.run(&doc).is_err());

    let second = Arc::new(PartClient::default());
    let rerun = pipeline(
        &config(Strategy::Parallel),
        second.clone(),
        FileProgressStore::new(dir.path()),
        &reducer,
    );
    let summary = rerun.run(&doc).unwrap();

    let mut called = second.parts_called();
    called.sort_unstable();
    assert_eq!(called, vec![2, 3]);
    assert_eq!(summary.chunks_resumed, 2);
    assert_eq!(summary.summary, "S0|S1|S2|S3");
}

#[test]
fn test_failing_client_leaves_record_unchanged() {
    let doc = document(3);
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::failing(&[(0, u32::MAX)]));
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        client.clone(),
        MemoryProgressStore::new(),
        &reducer,
    );

    let err = pipeline.run(&doc).unwrap_err();

    assert!(matches!(
        err,
        FilingError::ChunkFailed {
            chunk: 0,
            completed: 0,
            ..
        }
    ));
    assert_eq!(client.calls(), 1);
    assert!(pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().is_empty());
}

#[test]
fn test_reduction_failure_resumes_without_remapping() {
    let dir = tempdir().unwrap();
    let doc = document(4);
    let config = config(Strategy::Sequential);

    let failing = JoinReducer::failing();
    let client = Arc::new(PartClient::default());
    let run = pipeline(&config, client.clone(), FileProgressStore::new(dir.path()), &failing);
    let err = run.run(&doc).unwrap_err();

    assert!(matches!(err, FilingError::ReductionFailed { completed: 4, .. }));
    assert!(err.is_resumable());
    assert_eq!(client.calls(), 4);

    let reducer = JoinReducer::default();
    let second = Arc::new(PartClient::default());
    let rerun = pipeline(&config, second.clone(), FileProgressStore::new(dir.path()), &reducer);
    let summary = rerun.run(&doc).unwrap();

    assert_eq!(second.calls(), 0);
    assert_eq!(reducer.calls(), 1);
    assert_eq!(summary.chunks_resumed, 4);
    assert_eq!(summary.summary, "S0|S1|S2|S3");
}

#[test]
fn test_stale_record_is_discarded() {
    let doc = document(3);
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        client.clone(),
        MemoryProgressStore::new(),
        &reducer,
    );

    let old = ProgressKey::new("ACME", "10-K").with_fingerprint("0000");
    for stale in ["old 0", "old 1"] {
        pipeline.store().append(&old, stale).unwrap();
    }

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.parts_called(), vec![0, 1, 2]);
    assert_eq!(summary.chunks_resumed, 0);
    assert_eq!(summary.summary, "S0|S1|S2");
}

#[test]
fn test_record_longer_than_document_is_discarded() {
    let doc = document(2);
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        client.clone(),
        MemoryProgressStore::new(),
        &reducer,
    );

    let key = pipeline.progress_key(&doc);
    for extra in ["a", "b", "c"] {
        pipeline.store().append(&key, extra).unwrap();
    }

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.calls(), 2);
    assert_eq!(summary.summary, "S0|S1");
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn test_three_chunk_document_end_to_end() {
    let doc = Document::new("ACME", "10-K", "x".repeat(25_000));
    let mut config = Config::default();
    config.pipeline.chunk_size = 12_000;
    config.pipeline.overlap = 0;

    let reducer = JoinReducer::default();
    let client = Arc::new(CountingClient::default());
    let pipeline = pipeline(&config, client.clone(), MemoryProgressStore::new(), &reducer);

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().summaries,
        strings(&["S0", "S1", "S2"])
    );
    assert_eq!(
        reducer.seen.lock().unwrap().as_slice(),
        &[strings(&["S0", "S1", "S2"])]
    );
    assert_eq!(summary.summary, "S0|S1|S2");
    assert_eq!(summary.entity, "ACME");
    assert_eq!(summary.category, "10-K");
    assert_eq!(summary.strategy, Strategy::Sequential);
}

#[test]
fn test_blank_document_makes_no_calls() {
    let doc = Document::new("ACME", "10-K", "  \n\t ");
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        client.clone(),
        MemoryProgressStore::new(),
        &reducer,
    );

    let err = pipeline.run(&doc).unwrap_err();

    assert!(matches!(err, FilingError::NoContent { .. }));
    assert_eq!(err.exit_code() as i32, 3);
    assert_eq!(client.calls(), 0);
    assert_eq!(reducer.calls(), 0);
    assert!(pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().is_empty());
}

#[test]
fn test_default_reducer_synthesizes_labelled_partials() {
    let doc = document(3);
    let client = Arc::new(PartClient::default());
    let pipeline = Pipeline::new(
        &config(Strategy::Sequential),
        client.clone(),
        Box::new(MemoryProgressStore::new()),
    )
    .unwrap();

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(summary.summary, "FINAL");
    let prompts = client.prompts.lock().unwrap();
    let synthesis = prompts.last().unwrap();
    assert!(synthesis.contains("Summary of Part 1:\nS0"));
    assert!(synthesis.contains("Summary of Part 3:\nS2"));
}

#[test]
fn test_progress_cleared_when_not_kept() {
    let doc = document(2);
    let mut config = config(Strategy::Sequential);
    config.pipeline.keep_progress = false;
    let reducer = JoinReducer::default();
    let pipeline = pipeline(
        &config,
        Arc::new(PartClient::default()),
        MemoryProgressStore::new(),
        &reducer,
    );

    pipeline.run(&doc).unwrap();

    assert!(pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().is_empty());
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn test_skip_policy_records_gap() {
    let doc = document(4);
    let mut config = config(Strategy::Sequential);
    config.pipeline.failure_policy = FailurePolicy::Skip;
    let reducer = JoinReducer::default();
    let pipeline = pipeline(
        &config,
        Arc::new(PartClient::failing(&[(1, u32::MAX)])),
        MemoryProgressStore::new(),
        &reducer,
    );

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(summary.chunks_skipped, 1);
    assert_eq!(summary.summary, "S0|S2|S3");
    let record = pipeline.store().load(&pipeline.progress_key(&doc)).unwrap();
    assert_eq!(record.summaries, strings(&["S0", "", "S2", "S3"]));
    assert_eq!(record.gap_count(), 1);
}

#[test]
fn test_skip_policy_with_no_summaries_fails() {
    let doc = document(2);
    let mut config = config(Strategy::Sequential);
    config.pipeline.failure_policy = FailurePolicy::Skip;
    let reducer = JoinReducer::default();
    let pipeline = pipeline(
        &config,
        Arc::new(PartClient::failing(&[(0, u32::MAX), (1, u32::MAX)])),
        MemoryProgressStore::new(),
        &reducer,
    );

    let err = pipeline.run(&doc).unwrap_err();

    assert!(matches!(err, FilingError::NoChunksSummarized { total: 2 }));
    assert_eq!(reducer.calls(), 0);
}

#[test]
fn test_retry_recovers_transient_failure() {
    let doc = document(3);
    let mut config = config(Strategy::Sequential);
    config.pipeline.max_retries = 1;
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::failing(&[(1, 1)]));
    let pipeline = pipeline(&config, client.clone(), MemoryProgressStore::new(), &reducer);

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.calls(), 4);
    assert_eq!(summary.summary, "S0|S1|S2");
}

#[test]
fn test_failure_outcome_reports_progress() {
    let doc = document(3);
    let reducer = JoinReducer::default();
    let pipeline = pipeline(
        &config(Strategy::Sequential),
        Arc::new(PartClient::failing(&[(1, u32::MAX)])),
        MemoryProgressStore::new(),
        &reducer,
    );

    let outcome = SummaryOutcome::from_result(&pipeline.run(&doc));

    assert!(!outcome.is_success());
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["resumable"], true);
    assert_eq!(json["chunks_completed"], 1);
    assert_eq!(json["failed_chunk"], 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_interrupt_stops_before_next_chunk() {
    let dir = tempdir().unwrap();
    let doc = document(5);
    let config = config(Strategy::Sequential);
    let reducer = JoinReducer::default();

    let flag = Arc::new(AtomicBool::new(false));
    let client = Arc::new(PartClient {
        cancel_after: Some((1, Arc::clone(&flag))),
        ..Default::default()
    });
    let run = pipeline(&config, client.clone(), FileProgressStore::new(dir.path()), &reducer)
        .with_cancel_flag(flag);

    let err = run.run(&doc).unwrap_err();

    assert!(matches!(
        err,
        FilingError::Interrupted {
            completed: 2,
            total: 5
        }
    ));
    assert_eq!(client.calls(), 2);
    let key = run.progress_key(&doc);
    assert_eq!(run.store().load(&key).unwrap().len(), 2);

    let second = Arc::new(PartClient::default());
    let rerun = pipeline(&config, second.clone(), FileProgressStore::new(dir.path()), &reducer);
    rerun.run(&doc).unwrap();
    assert_eq!(second.parts_called(), vec![2, 3, 4]);
}

// ============================================================================
// Strategies
// ============================================================================

#[test]
fn test_refine_passes_running_summary() {
    let doc = document(3);
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(
        &config(Strategy::Refine),
        client.clone(),
        MemoryProgressStore::new(),
        &reducer,
    );

    let summary = pipeline.run(&doc).unwrap();

    let prompts = client.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("EXISTING SUMMARY"));
    assert!(prompts[1].contains("EXISTING SUMMARY:\n---\nS0\n---"));
    assert!(prompts[2].contains("EXISTING SUMMARY:\n---\nS1\n---"));
    assert_eq!(summary.summary, "S2");
    assert_eq!(reducer.calls(), 0);
}

#[test]
fn test_parallel_keeps_document_order() {
    let doc = document(7);
    let mut config = config(Strategy::Parallel);
    config.pipeline.workers = 3;
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(&config, client.clone(), MemoryProgressStore::new(), &reducer);

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.calls(), 7);
    assert_eq!(summary.summary, "S0|S1|S2|S3|S4|S5|S6");
    assert_eq!(
        pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().summaries,
        strings(&["S0", "S1", "S2", "S3", "S4", "S5", "S6"])
    );
}

#[test]
fn test_parallel_reuses_cached_prefix() {
    let doc = document(5);
    let mut config = config(Strategy::Parallel);
    config.pipeline.workers = 2;
    let reducer = JoinReducer::default();
    let client = Arc::new(PartClient::default());
    let pipeline = pipeline(&config, client.clone(), MemoryProgressStore::new(), &reducer);

    let key = pipeline.progress_key(&doc);
    pipeline
        .store()
        .replace(&key, &strings(&["S0", "S1"]))
        .unwrap();

    let summary = pipeline.run(&doc).unwrap();

    assert_eq!(client.parts_called(), vec![2, 3, 4]);
    assert_eq!(summary.chunks_resumed, 2);
    assert_eq!(summary.summary, "S0|S1|S2|S3|S4");
}

#[test]
fn test_parallel_halt_keeps_previous_record() {
    let doc = document(4);
    let mut config = config(Strategy::Parallel);
    config.pipeline.workers = 2;
    let reducer = JoinReducer::default();
    let pipeline = pipeline(
        &config,
        Arc::new(PartClient::failing(&[(3, u32::MAX)])),
        MemoryProgressStore::new(),
        &reducer,
    );

    let err = pipeline.run(&doc).unwrap_err();

    assert!(matches!(err, FilingError::ChunkFailed { chunk: 3, .. }));
    assert!(pipeline.store().load(&pipeline.progress_key(&doc)).unwrap().is_empty());
}
