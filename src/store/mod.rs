//! File-backed record store: one flat directory, one file per record,
//! per-name mutual exclusion.

mod error;
mod keys;
mod locks;

pub use error::StoreError;
pub use keys::{EXTENSION, safe_filename};

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;

use tokio::fs;
use tracing::error;

use locks::LockTable;

/// Record store over a single flat directory.
///
/// Construct one per process (or per test) and share it by reference;
/// the lock table inside serializes all operations on the same
/// sanitized key name. Payloads are opaque bytes written verbatim,
/// with no framing or metadata.
pub struct Store {
    dir: PathBuf,
    locks: LockTable,
}

impl Store {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            locks: LockTable::new(),
        })
    }

    /// Directory this store reads and writes.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Write `bytes` under `key`, replacing any existing record whole.
    /// An empty payload deletes the record instead and returns 0.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<usize, StoreError> {
        let name = keys::safe_filename(key);
        let _held = self.locks.acquire(&name).await;
        let path = self.dir.join(&name);

        if bytes.is_empty() {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    error!("put {key}: delete-on-empty failed: {e}");
                    return Err(e.into());
                }
            }
            return Ok(0);
        }

        if let Err(e) = fs::write(&path, bytes).await {
            error!("put {key}: write failed: {e}");
            return Err(e.into());
        }
        Ok(bytes.len())
    }

    /// Read the full payload stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let name = keys::safe_filename(key);
        let _held = self.locks.acquire(&name).await;
        let path = self.dir.join(&name);

        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => {
                error!("get {key}: read failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Remove the record under `key`. Absent records are not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let name = keys::safe_filename(key);
        let _held = self.locks.acquire(&name).await;
        let path = self.dir.join(&name);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                error!("delete {key}: remove failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Snapshot of stored key names (extension stripped) that begin
    /// with `prefix`.
    ///
    /// Reads the directory without taking any per-name lock, so the
    /// set may miss or include records raced by concurrent puts and
    /// deletes. Entries that do not carry the storage extension are
    /// ignored.
    pub async fn keys(&self, prefix: &str) -> Result<HashSet<String>, StoreError> {
        let mut names = HashSet::new();
        let mut entries = fs::read_dir(&self.dir).await.inspect_err(|e| {
            error!("keys: read_dir failed: {e}");
        })?;
        while let Some(entry) = entries.next_entry().await.inspect_err(|e| {
            error!("keys: next_entry failed: {e}");
        })? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(stem) = keys::strip_extension(file_name)
                && stem.starts_with(prefix)
            {
                names.insert(stem.to_string());
            }
        }
        Ok(names)
    }
}
