//! File-backed store that survives process restarts.
//!
//! Each key is kept in its own JSON document inside one directory. Expired
//! documents are deleted when they are next read or on `cleanup_expired`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use tracing::{debug, info, instrument, warn};

use recall_core::constants::STORE_FILE_EXTENSION;
use recall_core::error::{RecallError, Result};
use recall_core::traits::{ComputeFn, DurableCache};
use recall_core::types::ComputationKey;

/// Suffix for documents that are still being written.
const TEMP_EXTENSION: &str = "tmp";

/// Disambiguates temporary files written concurrently by one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A persisted entry.
///
/// # File Format
///
/// ```text
/// {
///   "key": "<computation key>",
///   "created_at": "<RFC 3339>",
///   "expires_at": "<RFC 3339>",
///   "value": "<hex-encoded bytes>"
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileEntry {
    /// Key the value was stored under
    pub key: String,
    /// When the value was written
    pub created_at: DateTime<Utc>,
    /// When the value stops being served
    pub expires_at: DateTime<Utc>,
    /// Encoded value
    #[serde(with = "hex")]
    pub value: Vec<u8>,
}

impl FileEntry {
    /// Creates an entry expiring `ttl` from now.
    ///
    /// Fails if the expiry is not a representable timestamp.
    pub fn new(key: &str, value: Vec<u8>, ttl: Duration) -> Result<Self> {
        let out_of_range = || RecallError::StoreError(format!("ttl out of range: {:?}", ttl));
        let created_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| created_at.checked_add_signed(delta))
            .ok_or_else(out_of_range)?;
        Ok(Self {
            key: key.to_string(),
            created_at,
            expires_at,
            value,
        })
    }

    /// Checks if the entry has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// File-backed durable cache.
///
/// Document names are the SHA3-256 of the key, so any key maps to a valid
/// file name. Writes go to a temporary file that is renamed into place, so
/// readers never observe a partial document. Concurrent misses on one key
/// may both compute; the last rename wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            RecallError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create store directory {}: {}", dir.display(), e),
            ))
        })?;
        debug!(dir = %dir.display(), "Opened file store");
        Ok(Self { dir })
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Gets an unexpired value by key, deleting the document if it has expired.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read_live(key)?.map(|entry| entry.value))
    }

    /// Stores a value that expires after `ttl`.
    pub fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let entry = FileEntry::new(key, value, ttl)?;
        let path = self.entry_path(key);
        let temp = path.with_extension(format!(
            "{}.{}.{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
            TEMP_EXTENSION
        ));

        fs::write(&temp, serde_json::to_vec_pretty(&entry)?)?;
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        debug!(key, expires_at = %entry.expires_at, "Stored entry");
        Ok(())
    }

    /// Removes an entry. Returns true if one was present.
    pub fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every readable entry, expired ones included.
    ///
    /// Documents that cannot be parsed are skipped with a warning.
    pub fn entries(&self) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for path in self.document_paths()? {
            match Self::read_document(&path) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable entry"),
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Deletes expired and unreadable documents, returning how many were removed.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.document_paths()? {
            let stale = match Self::read_document(&path) {
                Ok(entry) => entry.is_expired(),
                Err(_) => true,
            };
            if stale {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!(removed, "Cleaned up expired entries");
        Ok(removed)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha3_256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), STORE_FILE_EXTENSION))
    }

    fn document_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == STORE_FILE_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn read_document(path: &Path) -> Result<FileEntry> {
        let contents = fs::read(path)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    fn read_live(&self, key: &str) -> Result<Option<FileEntry>> {
        let path = self.entry_path(key);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry =
            serde_json::from_slice(&contents).map_err(|e| RecallError::CorruptEntry {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if entry.key != key {
            return Err(RecallError::CorruptEntry {
                key: key.to_string(),
                reason: format!("document belongs to key '{}'", entry.key),
            });
        }

        if entry.is_expired() {
            debug!(key, "Entry expired, removing");
            self.remove(key)?;
            return Ok(None);
        }

        Ok(Some(entry))
    }
}

impl DurableCache for FileStore {
    #[instrument(skip(self, compute), fields(key = %key))]
    fn get_or_compute(
        &self,
        key: &ComputationKey,
        ttl: Duration,
        compute: &mut ComputeFn<'_>,
    ) -> Result<Vec<u8>> {
        if let Some(value) = self.get(key.as_str())? {
            debug!("Store hit");
            return Ok(value);
        }

        debug!(ttl_secs = ttl.as_secs(), "Store miss, computing");
        let value = compute()?;
        self.insert(key.as_str(), value.clone(), ttl)?;
        Ok(value)
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    fn clear(&self) -> Result<()> {
        let paths = self.document_paths()?;
        let count = paths.len();
        for path in paths {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(count, "Cleared file store");
        Ok(())
    }
}
