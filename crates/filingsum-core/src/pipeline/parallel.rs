//! Bounded parallel map phase
//!
//! Pending chunks are handed out to scoped worker threads through a shared
//! counter. Results are put back in document order before the failure policy
//! is applied, and the full record is written once at the end.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info};

use super::state::StateTracker;
use super::{Pipeline, PipelineState};
use crate::chunker::Chunk;
use crate::error::{FilingError, Result};
use crate::inference::InferenceError;
use crate::progress::ProgressKey;

type ChunkResult = std::result::Result<String, InferenceError>;

pub(super) fn map_chunks(
    pipeline: &Pipeline,
    key: &ProgressKey,
    chunks: &[Chunk<'_>],
    existing: Vec<String>,
    state: &mut StateTracker,
) -> Result<Vec<String>> {
    let total = chunks.len();
    let first_pending = existing.len();
    if first_pending == total {
        debug!(entity = %key.entity, "all chunks cached");
        return Ok(existing);
    }

    pipeline.check_cancelled(first_pending, total)?;
    state.advance(PipelineState::Processing(first_pending));

    let workers = pipeline.settings.workers.max(1).min(total - first_pending);
    info!(workers, pending = total - first_pending, "dispatching chunks");

    let slots = run_workers(pipeline, key, chunks, first_pending, workers);

    let mut summaries = existing;
    for (index, slot) in (first_pending..).zip(slots) {
        let summary = match slot {
            Some(Ok(summary)) => summary,
            Some(Err(source)) => {
                pipeline.apply_failure_policy(index, total, first_pending, source)?
            }
            // Never dispatched because the run was cancelled
            None => {
                info!(completed = first_pending, total, "summarization interrupted");
                return Err(FilingError::Interrupted {
                    completed: first_pending,
                    total,
                });
            }
        };
        summaries.push(summary);
    }

    pipeline.store.replace(key, &summaries)?;
    Ok(summaries)
}

/// One slot per pending chunk, in document order
fn run_workers(
    pipeline: &Pipeline,
    key: &ProgressKey,
    chunks: &[Chunk<'_>],
    first_pending: usize,
    workers: usize,
) -> Vec<Option<ChunkResult>> {
    let total = chunks.len();
    let next = AtomicUsize::new(first_pending);
    let (tx, rx) = mpsc::channel::<(usize, ChunkResult)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                if pipeline.cancel.load(Ordering::SeqCst) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(chunk) = chunks.get(index) else {
                    break;
                };
                info!(chunk = index + 1, total, entity = %key.entity, "summarizing chunk");
                let result = pipeline.summarize_with_retry(chunk, &key.entity, None);
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<ChunkResult>> = (first_pending..total).map(|_| None).collect();
    for (index, result) in rx {
        slots[index - first_pending] = Some(result);
    }
    slots
}
