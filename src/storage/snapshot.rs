use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::StoreError;

/// Whole-collection JSON file, rewritten through a temp file and a rename so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: PathBuf) -> Self { Self { path } }

    /// Rows stored in the file; a missing file is an empty collection.
    pub(crate) fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        if !self.path.exists() { return Ok(Vec::new()); }
        let bytes = std::fs::read(&self.path).map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        if bytes.iter().all(|b| b.is_ascii_whitespace()) { return Ok(Vec::new()); }
        let rows: Vec<T> = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path: self.path.clone(), source })?;
        debug!(target: "lostfound::storage", "snapshot.load path='{}' rows={}", self.path.display(), rows.len());
        Ok(rows)
    }

    pub(crate) fn save<T: Serialize>(&self, rows: &[T]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(rows)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
        debug!(target: "lostfound::storage", "snapshot.save path='{}' rows={}", self.path.display(), rows.len());
        Ok(())
    }
}
