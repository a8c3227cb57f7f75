//! Error types and exit codes for filingsum
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure (inference, reduction, interruption, IO)
//! - 2: Usage or configuration error
//! - 3: Data error (empty input, corrupt progress record, filing not found)

mod macros;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::inference::InferenceError;

/// Exit codes for the filingsum binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args/config (2)
    Usage = 2,
    /// Data error - empty document, corrupt record, unknown filing (3)
    Data = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Caller-facing classification of a failure.
///
/// This is the `error_kind` reported in a failed summary outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputError,
    InferenceFailure,
    ProgressStoreCorruption,
    ReductionFailure,
    Interrupted,
    ConfigurationError,
    RetrievalError,
    IoError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputError => "input_error",
            ErrorKind::InferenceFailure => "inference_failure",
            ErrorKind::ProgressStoreCorruption => "progress_store_corruption",
            ErrorKind::ReductionFailure => "reduction_failure",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::RetrievalError => "retrieval_error",
            ErrorKind::IoError => "io_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during filingsum operations
#[derive(Error, Debug)]
pub enum FilingError {
    // Input errors (exit code 3)
    #[error("no content to summarize for {entity} {category}")]
    NoContent { entity: String, category: String },

    #[error("document processing failed for {path:?}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    // Pipeline failures (exit code 1)
    #[error("summarizing chunk index {chunk} failed ({completed} of {total} chunks completed): {source}")]
    ChunkFailed {
        chunk: usize,
        total: usize,
        completed: usize,
        #[source]
        source: InferenceError,
    },

    #[error("failed to summarize any of the {total} chunks")]
    NoChunksSummarized { total: usize },

    #[error("final synthesis failed after {completed} chunks: {source}")]
    ReductionFailed {
        completed: usize,
        #[source]
        source: InferenceError,
    },

    #[error("interrupted after {completed} of {total} chunks")]
    Interrupted { completed: usize, total: usize },

    // Progress store errors (exit code 3)
    #[error("progress record {path:?} is unreadable: {reason}")]
    ProgressCorrupt { path: PathBuf, reason: String },

    // Retrieval errors (exit code 3)
    #[error("{context} not found: {value}")]
    NotFound { context: String, value: String },

    // Usage errors (exit code 2)
    #[error("{0}")]
    UsageError(String),

    #[error("invalid {context}: {value}")]
    InvalidValue { context: String, value: String },

    // Generic failures (exit code 1)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to {operation}: {reason}")]
    FailedOperation { operation: String, reason: String },

    #[error("failed to {operation} {target}: {reason}")]
    FailedOperationWithTarget {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl FilingError {
    /// Create an error for an invalid value or configuration
    pub fn invalid_value(context: &str, value: impl std::fmt::Display) -> Self {
        FilingError::InvalidValue {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for an entity that was not found
    pub fn not_found(context: &str, value: impl std::fmt::Display) -> Self {
        FilingError::NotFound {
            context: context.to_string(),
            value: value.to_string(),
        }
    }

    /// Create an error for a failed IO operation with context
    pub fn io_operation(
        operation: &str,
        path: impl std::fmt::Display,
        error: impl std::fmt::Display,
    ) -> Self {
        FilingError::FailedOperationWithTarget {
            operation: operation.to_string(),
            target: path.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create an error for a failed remote request
    pub fn request(operation: &str, error: impl std::fmt::Display) -> Self {
        FilingError::FailedOperation {
            operation: operation.to_string(),
            reason: error.to_string(),
        }
    }

    /// Classify this error for the caller-facing outcome
    pub fn kind(&self) -> ErrorKind {
        match self {
            FilingError::NoContent { .. } | FilingError::Extraction { .. } => ErrorKind::InputError,
            FilingError::ChunkFailed { .. } | FilingError::NoChunksSummarized { .. } => {
                ErrorKind::InferenceFailure
            }
            FilingError::ReductionFailed { .. } => ErrorKind::ReductionFailure,
            FilingError::Interrupted { .. } => ErrorKind::Interrupted,
            FilingError::ProgressCorrupt { .. } => ErrorKind::ProgressStoreCorruption,
            FilingError::NotFound { .. } | FilingError::FailedOperation { .. } => {
                ErrorKind::RetrievalError
            }
            FilingError::UsageError(_) | FilingError::InvalidValue { .. } | FilingError::Toml(_) => {
                ErrorKind::ConfigurationError
            }
            FilingError::Io(_)
            | FilingError::Json(_)
            | FilingError::FailedOperationWithTarget { .. }
            | FilingError::Other(_) => ErrorKind::IoError,
        }
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.kind() {
            ErrorKind::ConfigurationError => ExitCode::Usage,
            ErrorKind::InputError
            | ErrorKind::ProgressStoreCorruption
            | ErrorKind::RetrievalError => ExitCode::Data,
            ErrorKind::InferenceFailure
            | ErrorKind::ReductionFailure
            | ErrorKind::Interrupted
            | ErrorKind::IoError => ExitCode::Failure,
        }
    }

    /// Whether re-running the same command continues from persisted progress
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            FilingError::ChunkFailed { .. }
                | FilingError::ReductionFailed { .. }
                | FilingError::Interrupted { .. }
        )
    }

    /// Number of chunks durably recorded when the run stopped, if known
    pub fn chunks_completed(&self) -> Option<usize> {
        match self {
            FilingError::ChunkFailed { completed, .. }
            | FilingError::ReductionFailed { completed, .. }
            | FilingError::Interrupted { completed, .. } => Some(*completed),
            FilingError::NoContent { .. } | FilingError::NoChunksSummarized { .. } => Some(0),
            _ => None,
        }
    }

    /// Index of the chunk whose inference call failed, if any
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            FilingError::ChunkFailed { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    /// Convert error to JSON representation for structured error output.
    pub fn to_json(&self) -> serde_json::Value {
        let mut error_obj = serde_json::json!({
            "code": self.exit_code() as i32,
            "type": self.kind().as_str(),
            "message": self.to_string(),
            "resumable": self.is_resumable(),
        });

        if let Some(completed) = self.chunks_completed() {
            error_obj["chunks_completed"] = serde_json::json!(completed);
        }
        if let Some(chunk) = self.failed_chunk() {
            error_obj["failed_chunk"] = serde_json::json!(chunk);
        }

        serde_json::json!({ "error": error_obj })
    }
}

/// Result type alias for filingsum operations
pub type Result<T> = std::result::Result<T, FilingError>;
