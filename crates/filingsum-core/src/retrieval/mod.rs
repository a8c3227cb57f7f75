//! Locating raw filings
//!
//! A [`FilingSource`] turns an (entity, category) pair into a path to a raw
//! filing on disk. [`EdgarClient`] downloads from SEC EDGAR;
//! [`LocalFileSource`] serves a file the user already has.

mod edgar;

use std::path::{Path, PathBuf};

use crate::error::{FilingError, Result};

pub use edgar::{select_latest, EdgarClient, FilingRef, RecentFilings};

/// Something that can produce the latest filing for an entity
pub trait FilingSource {
    fn latest_filing(&self, entity: &str, category: &str) -> Result<PathBuf>;
}

/// A single filing already on disk
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FilingSource for LocalFileSource {
    fn latest_filing(&self, _entity: &str, _category: &str) -> Result<PathBuf> {
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(FilingError::not_found("filing file", self.path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_source_returns_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filing.txt");
        std::fs::write(&path, "text").unwrap();

        let source = LocalFileSource::new(&path);
        assert_eq!(source.latest_filing("AAPL", "10-K").unwrap(), path);
    }

    #[test]
    fn test_local_source_missing_file() {
        let dir = tempdir().unwrap();
        let source = LocalFileSource::new(dir.path().join("nope.txt"));
        let err = source.latest_filing("AAPL", "10-K").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RetrievalError);
    }
}
