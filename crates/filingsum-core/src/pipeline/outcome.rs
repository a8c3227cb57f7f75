//! Run results as reported to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::error::{ErrorKind, FilingError, Result};

/// The product of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub entity: String,
    pub category: String,
    pub summary: String,
    /// Wall-clock time of this invocation
    pub duration_secs: f64,
    /// Chunks in the document
    pub chunks_processed: usize,
    /// Chunks taken from the progress record instead of the model
    pub chunks_resumed: usize,
    /// Chunks recorded as gaps under the skip policy
    pub chunks_skipped: usize,
    pub strategy: Strategy,
    pub generated_at: DateTime<Utc>,
}

/// Details of a failed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub error_kind: ErrorKind,
    pub message: String,
    pub resumable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_completed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_chunk: Option<usize>,
}

impl From<&FilingError> for FailureReport {
    fn from(error: &FilingError) -> Self {
        Self {
            error_kind: error.kind(),
            message: error.to_string(),
            resumable: error.is_resumable(),
            chunks_completed: error.chunks_completed(),
            failed_chunk: error.failed_chunk(),
        }
    }
}

/// Caller-facing result, tagged by `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SummaryOutcome {
    Success(FinalSummary),
    Error(FailureReport),
}

impl SummaryOutcome {
    pub fn from_result(result: &Result<FinalSummary>) -> Self {
        match result {
            Ok(summary) => SummaryOutcome::Success(summary.clone()),
            Err(error) => SummaryOutcome::Error(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SummaryOutcome::Success(_))
    }
}
