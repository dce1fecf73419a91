//! Last-known-good catalog on disk
//!
//! Stores the flat category list from the most recent successful fetch as a
//! JSON file, so a fresh process that cannot reach the catalog still has
//! something to serve.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::data::CategoryRecord;

const CATALOG_FILE: &str = "categories.json";

/// Errors reading or writing the on-disk catalog
#[derive(Debug, Error)]
pub enum DiskCacheError {
    /// The cache directory or file could not be read or written
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The cache file exists but is not a stored catalog
    #[error("cache file is not a stored catalog: {0}")]
    Format(#[from] serde_json::Error),
}

/// Catalog as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCatalog {
    /// The flat list exactly as fetched
    pub records: Vec<CategoryRecord>,
    /// When the list was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Reads and writes the catalog file
///
/// Lives in an XDG-compliant cache directory (`~/.cache/catindex/` on Linux)
/// unless a directory is given.
#[derive(Debug, Clone)]
pub struct DiskCache {
    cache_dir: PathBuf,
}

impl DiskCache {
    /// Uses the platform cache directory for `catindex`
    ///
    /// Returns `None` if it cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "catindex")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Uses a custom cache directory
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn catalog_path(&self) -> PathBuf {
        self.cache_dir.join(CATALOG_FILE)
    }

    /// Writes the fetched list, creating the directory if needed
    ///
    /// The file is written next to the target and renamed over it, so a
    /// reader never sees a partial catalog.
    pub fn write(
        &self,
        records: &[CategoryRecord],
        fetched_at: DateTime<Utc>,
    ) -> Result<(), DiskCacheError> {
        fs::create_dir_all(&self.cache_dir)?;

        #[derive(Serialize)]
        struct Entry<'a> {
            records: &'a [CategoryRecord],
            fetched_at: DateTime<Utc>,
        }

        let json = serde_json::to_string_pretty(&Entry {
            records,
            fetched_at,
        })?;

        let tmp = self.cache_dir.join(format!("{CATALOG_FILE}.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.catalog_path())?;
        Ok(())
    }

    /// Reads the stored catalog
    ///
    /// # Returns
    /// * `Ok(Some(StoredCatalog))` if a catalog was stored
    /// * `Ok(None)` if nothing has been stored yet
    /// * `Err` if the file cannot be read or parsed
    pub fn read(&self) -> Result<Option<StoredCatalog>, DiskCacheError> {
        let content = match fs::read_to_string(self.catalog_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}
