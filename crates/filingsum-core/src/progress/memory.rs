//! In-memory progress store for tests and one-shot runs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{ProgressKey, ProgressRecord, ProgressStore};
use crate::error::{FilingError, Result};

type RecordKey = (String, String);

/// Progress store that forgets everything when dropped
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: Mutex<HashMap<RecordKey, ProgressRecord>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, HashMap<RecordKey, ProgressRecord>>> {
        self.records
            .lock()
            .map_err(|_| FilingError::Other("progress store lock poisoned".to_string()))
    }

    fn write(&self, key: &ProgressKey, update: impl FnOnce(&mut Vec<String>)) -> Result<()> {
        let mut records = self.records()?;
        let record = records
            .entry((key.entity.clone(), key.category.clone()))
            .or_default();
        update(&mut record.summaries);
        record.fingerprint = key.fingerprint.clone();
        record.updated_at = Some(Utc::now());
        Ok(())
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, key: &ProgressKey) -> Result<ProgressRecord> {
        Ok(self
            .records()?
            .get(&(key.entity.clone(), key.category.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn append(&self, key: &ProgressKey, summary: &str) -> Result<()> {
        self.write(key, |summaries| summaries.push(summary.to_string()))
    }

    fn replace(&self, key: &ProgressKey, summaries: &[String]) -> Result<()> {
        self.write(key, |stored| *stored = summaries.to_vec())
    }

    fn clear(&self, key: &ProgressKey) -> Result<bool> {
        Ok(self
            .records()?
            .remove(&(key.entity.clone(), key.category.clone()))
            .is_some())
    }

    fn location(&self, key: &ProgressKey) -> String {
        format!("memory:{}/{}", key.entity, key.category)
    }
}
