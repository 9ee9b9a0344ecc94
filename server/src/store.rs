//! Snapshot store — one durable blob per document name.
//!
//! DESIGN
//! ======
//! Documents persist as opaque `<name>.snapshot` files under one directory.
//! Names are sanitized to `[A-Za-z0-9-_]` before touching the filesystem so
//! a hostile document name cannot escape the data directory. Saves write to
//! a `.tmp` sibling and rename over the old file, so an interrupted save
//! never corrupts the prior snapshot.
//!
//! ERROR HANDLING
//! ==============
//! A missing file reads as `None` (new document). Any other read failure is
//! reported to the caller, which treats it as an empty document — visible
//! data loss only when no prior in-memory state exists either.

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;

use std::path::{Path, PathBuf};

use tracing::info;

const SNAPSHOT_EXT: &str = "snapshot";

/// Snapshot store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate statistics over all persisted snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub documents: usize,
    pub total_bytes: u64,
}

/// File-backed store of one snapshot per sanitized document name.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

/// Replace every character outside `[A-Za-z0-9-_]` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl SnapshotStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an io error if the directory cannot be created.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    fn doc_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{SNAPSHOT_EXT}", sanitize_name(name)))
    }

    /// Read the snapshot for `name`, or `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns an io error for failures other than the file being absent.
    pub async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.doc_path(name)).await {
            Ok(bytes) => {
                info!(doc = name, bytes = bytes.len(), "loaded snapshot");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace the snapshot for `name`.
    ///
    /// # Errors
    ///
    /// Returns an io error if the temp write or rename fails; the previous
    /// snapshot is left intact in that case.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.doc_path(name);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        info!(doc = name, bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    /// List the sanitized names of every stored document.
    ///
    /// # Errors
    ///
    /// Returns an io error if the directory cannot be read.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Count and total size of all stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns an io error if the directory cannot be read.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats { documents: 0, total_bytes: 0 };
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXT) {
                stats.documents += 1;
                stats.total_bytes += entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(stats)
    }
}
