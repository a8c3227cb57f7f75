//! JSON file progress store
//!
//! Layout: `<root>/<entity>/<category>.json`, where each component is a slug
//! followed by a short hash of the raw value, so keys that differ only in
//! punctuation ("BRK.B" and "BRK-B") never share a file. Every update writes a
//! sibling `.tmp` file, syncs it and renames it over the record.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, trace, warn};

use super::{ProgressKey, ProgressRecord, ProgressStore, PROGRESS_FORMAT_VERSION};
use crate::error::{FilingError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    version: u32,
    entity: String,
    category: String,
    #[serde(flatten)]
    record: ProgressRecord,
}

/// Owner fields of a record file, readable even when the rest is damaged
#[derive(Debug, Deserialize)]
struct RecordOwner {
    entity: String,
    category: String,
}

impl RecordOwner {
    fn is(&self, key: &ProgressKey) -> bool {
        self.entity == key.entity && self.category == key.category
    }
}

/// Progress store backed by one JSON file per key
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for `key`
    pub fn record_path(&self, key: &ProgressKey) -> PathBuf {
        self.root
            .join(path_component(&key.entity))
            .join(format!("{}.json", path_component(&key.category)))
    }

    fn read(&self, key: &ProgressKey) -> Result<ProgressRecord> {
        let path = self.record_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProgressRecord::default()),
            Err(e) => {
                return Err(FilingError::ProgressCorrupt {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        let file: RecordFile =
            serde_json::from_str(&content).map_err(|e| FilingError::ProgressCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if file.version != PROGRESS_FORMAT_VERSION {
            return Err(FilingError::ProgressCorrupt {
                path,
                reason: format!("unsupported format version {}", file.version),
            });
        }
        if file.entity != key.entity || file.category != key.category {
            return Err(FilingError::ProgressCorrupt {
                path,
                reason: format!(
                    "record belongs to {} {}, not {}",
                    file.entity, file.category, key
                ),
            });
        }

        Ok(file.record)
    }

    fn write(&self, key: &ProgressKey, summaries: Vec<String>) -> Result<()> {
        let path = self.record_path(key);
        let dir = path
            .parent()
            .ok_or_else(|| FilingError::Other(format!("invalid progress path {}", path.display())))?;
        fs::create_dir_all(dir)
            .map_err(|e| FilingError::io_operation("create progress directory", dir.display(), e))?;

        let file = RecordFile {
            version: PROGRESS_FORMAT_VERSION,
            entity: key.entity.clone(),
            category: key.category.clone(),
            record: ProgressRecord {
                fingerprint: key.fingerprint.clone(),
                updated_at: Some(Utc::now()),
                summaries,
            },
        };

        let temp_path = path.with_extension("json.tmp");
        write_synced(&temp_path, &file)
            .map_err(|e| FilingError::io_operation("write progress record", temp_path.display(), e))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| FilingError::io_operation("commit progress record", path.display(), e))?;
        sync_dir(dir);

        trace!(path = %path.display(), entries = file.record.summaries.len(), "progress_written");
        Ok(())
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self, key: &ProgressKey) -> Result<ProgressRecord> {
        let record = self.read(key)?;
        debug!(key = %key, entries = record.len(), "progress_loaded");
        Ok(record)
    }

    fn append(&self, key: &ProgressKey, summary: &str) -> Result<()> {
        let mut summaries = self.read(key)?.summaries;
        summaries.push(summary.to_string());
        self.write(key, summaries)
    }

    fn replace(&self, key: &ProgressKey, summaries: &[String]) -> Result<()> {
        self.write(key, summaries.to_vec())
    }

    fn clear(&self, key: &ProgressKey) -> Result<bool> {
        let path = self.record_path(key);
        // Unparsable records are still removable; foreign ones are not
        let owner = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str::<RecordOwner>(&content).ok());
        if let Some(owner) = owner.filter(|owner| !owner.is(key)) {
            warn!(
                path = %path.display(),
                owner = %format!("{} {}", owner.entity, owner.category),
                key = %key,
                "not clearing a record that belongs to another key"
            );
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilingError::io_operation(
                "remove progress record",
                path.display(),
                e,
            )),
        }
    }

    fn location(&self, key: &ProgressKey) -> String {
        self.record_path(key).display().to_string()
    }
}

fn write_synced(path: &Path, file: &RecordFile) -> std::io::Result<()> {
    let handle = File::create(path)?;
    let mut writer = BufWriter::new(handle);
    serde_json::to_writer_pretty(&mut writer, file)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Persist the rename itself; not every platform supports syncing directories
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

/// File-system safe, collision-free name for an entity or category
fn path_component(value: &str) -> String {
    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    let slug = slug::slugify(value);
    let slug = if slug.is_empty() { "_" } else { slug.as_str() };
    format!("{}-{}", slug, &digest[..8])
}
