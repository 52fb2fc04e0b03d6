use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use super::EvidenceStore;
use crate::domain::{Result, TrafficError};

/// Evidence documents as files in a local directory.
///
/// Layout: `<root>/<packet_id>_<YYYYMMDD_HHMMSS>.json`
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn write_atomic(dir: &Path, target: &Path, body: &[u8]) -> Result<()> {
    // Write to a temp file in the same directory, then rename into place.
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl EvidenceStore for FsEvidenceStore {
    async fn put(&self, name: &str, body: &[u8]) -> Result<String> {
        let target = self.root.join(name);
        let dir = self.root.clone();
        let path = target.clone();
        let body = body.to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &body))
            .await
            .map_err(|e| TrafficError::Storage(format!("evidence write task failed: {e}")))??;

        debug!(path = %target.display(), "evidence written");
        Ok(target.to_string_lossy().into_owned())
    }

    fn is_local(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsEvidenceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn put_writes_file_and_returns_path() {
        let (dir, store) = make_store();
        let path = store.put("EV-1_20260101_000000.json", b"{}").await.unwrap();
        assert_eq!(path, dir.path().join("EV-1_20260101_000000.json").to_string_lossy());
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert!(store.is_local());
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (dir, store) = make_store();
        store.put("EV-2_20260101_000000.json", b"[1]").await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn new_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("b");
        FsEvidenceStore::new(&root).unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn unwritable_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path().join("gone")).unwrap();
        std::fs::remove_dir(store.root()).unwrap();
        assert!(store.put("EV-3_20260101_000000.json", b"{}").await.is_err());
    }
}
