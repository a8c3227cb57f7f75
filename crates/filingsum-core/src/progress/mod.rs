//! Durable per-chunk progress
//!
//! A progress record is the ordered list of partial summaries produced so far
//! for one (entity, category) pair. The orchestrator reads it at startup to
//! find the resume point and appends to it after every successful chunk.
//! Writes replace the whole record atomically, so a crash leaves either the
//! previous or the new record on disk, never a torn one.

mod file;
mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;

/// On-disk format version of progress records
pub const PROGRESS_FORMAT_VERSION: u32 = 1;

/// Identifies one progress record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub entity: String,
    pub category: String,
    /// Fingerprint of the document being summarized, written with each update
    pub fingerprint: Option<String>,
}

impl ProgressKey {
    pub fn new(entity: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            category: category.into(),
            fingerprint: None,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

impl std::fmt::Display for ProgressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entity, self.category)
    }
}

/// Stored partial summaries for one key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summaries: Vec<String>,
}

impl ProgressRecord {
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Whether this record was produced for a different document.
    ///
    /// Records without a fingerprint on either side are never stale.
    pub fn is_stale_for(&self, key: &ProgressKey) -> bool {
        match (&self.fingerprint, &key.fingerprint) {
            (Some(stored), Some(current)) => stored != current,
            _ => false,
        }
    }

    /// Gap entries recorded for skipped chunks
    pub fn gap_count(&self) -> usize {
        self.summaries.iter().filter(|s| s.is_empty()).count()
    }
}

/// Persistence for progress records
///
/// Implementations assume a single writer per key.
pub trait ProgressStore: Send + Sync {
    /// Load the record for `key`; a missing record is an empty record.
    fn load(&self, key: &ProgressKey) -> Result<ProgressRecord>;

    /// Durably add one summary to the end of the record.
    fn append(&self, key: &ProgressKey, summary: &str) -> Result<()>;

    /// Durably replace the whole record.
    fn replace(&self, key: &ProgressKey, summaries: &[String]) -> Result<()>;

    /// Remove the record. Returns whether one existed.
    fn clear(&self, key: &ProgressKey) -> Result<bool>;

    /// Human-readable location of the record
    fn location(&self, key: &ProgressKey) -> String;
}
