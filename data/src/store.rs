//! [`PersistenceStore`] and [`FileSystemStore`] (§4.2).

use crate::error::PersistError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Crash-durable key/blob store, namespaced so unrelated subsystems (signal
/// state, candle cache) don't collide on disk.
#[async_trait]
pub trait PersistenceStore: Send + Sync + std::fmt::Debug {
    /// One-shot per namespace: create its directory if missing, scan
    /// existing entries through `validate`, and drop (delete) any that
    /// fail it. Idempotent — a second call for an already-initialized
    /// namespace is a no-op. Only a directory-create failure is fatal.
    async fn wait_for_init(
        &self,
        namespace: &str,
        validate: &(dyn Fn(&[u8]) -> bool + Sync),
    ) -> Result<(), PersistError>;

    /// `None` if `key` has never been written (or was dropped at init).
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, PersistError>;

    async fn has(&self, namespace: &str, key: &str) -> Result<bool, PersistError>;

    /// Atomic: a concurrent `read` observes either the old blob or the new
    /// one, never a partial write. `write` only returns once the blob is
    /// durably in place — a subsequent `read` is guaranteed to see it.
    async fn write(&self, namespace: &str, key: &str, blob: &[u8]) -> Result<(), PersistError>;
}

/// [`PersistenceStore`] backed by one file per key under
/// `root/{namespace}/{key}`, written via temp-file-then-rename within the
/// same directory so the rename is atomic on every platform the engine
/// targets.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    root: PathBuf,
    initialized: std::sync::Arc<RwLock<HashSet<String>>>,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: std::sync::Arc::new(RwLock::new(HashSet::new())),
        }
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn key_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(key)
    }
}

#[async_trait]
impl PersistenceStore for FileSystemStore {
    async fn wait_for_init(
        &self,
        namespace: &str,
        validate: &(dyn Fn(&[u8]) -> bool + Sync),
    ) -> Result<(), PersistError> {
        if self.initialized.read().contains(namespace) {
            return Ok(());
        }

        let dir = self.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| PersistError::Init {
                namespace: namespace.to_string(),
                source,
            })?;

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|source| PersistError::Init {
            namespace: namespace.to_string(),
            source,
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|source| PersistError::Init {
            namespace: namespace.to_string(),
            source,
        })? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(blob) if validate(&blob) => {}
                Ok(_) => {
                    warn!(namespace, path = %path.display(), "dropping structurally invalid entry");
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Err(error) => {
                    warn!(namespace, path = %path.display(), %error, "dropping unreadable entry");
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }

        self.initialized.write().insert(namespace.to_string());
        Ok(())
    }

    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, PersistError> {
        let path = self.key_path(namespace, key);
        match tokio::fs::read(&path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Read {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn has(&self, namespace: &str, key: &str) -> Result<bool, PersistError> {
        Ok(self.read(namespace, key).await?.is_some())
    }

    async fn write(&self, namespace: &str, key: &str, blob: &[u8]) -> Result<(), PersistError> {
        let dir = self.namespace_dir(namespace);
        let target = self.key_path(namespace, key);
        let blob = blob.to_vec();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &blob))
            .await
            .expect("blocking write task panicked")
            .map_err(|source| PersistError::Write {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source,
            })
    }
}

fn write_atomic(dir: &Path, target: &Path, blob: &[u8]) -> io::Result<()> {
    use std::io::Write;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(blob)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (FileSystemStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileSystemStore::new(dir.path()), dir)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (store, _dir) = store();
        store.wait_for_init("signals", &|_| true).await.unwrap();
        store.write("signals", "abc", b"hello").await.unwrap();
        assert_eq!(store.read("signals", "abc").await.unwrap(), Some(b"hello".to_vec()));
        assert!(store.has("signals", "abc").await.unwrap());
    }

    #[tokio::test]
    async fn read_of_missing_key_is_none_not_error() {
        let (store, _dir) = store();
        store.wait_for_init("signals", &|_| true).await.unwrap();
        assert_eq!(store.read("signals", "missing").await.unwrap(), None);
        assert!(!store.has("signals", "missing").await.unwrap());
    }

    #[tokio::test]
    async fn init_drops_structurally_invalid_entries() {
        let (store, dir) = store();
        let ns_dir = dir.path().join("signals");
        tokio::fs::create_dir_all(&ns_dir).await.unwrap();
        tokio::fs::write(ns_dir.join("bad"), b"not json").await.unwrap();
        tokio::fs::write(ns_dir.join("good"), b"{}").await.unwrap();

        store
            .wait_for_init("signals", &|blob| blob == b"{}")
            .await
            .unwrap();

        assert_eq!(store.read("signals", "good").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.read("signals", "bad").await.unwrap(), None);
    }

    #[tokio::test]
    async fn init_is_idempotent_and_does_not_rescan() {
        let (store, dir) = store();
        store.wait_for_init("signals", &|_| true).await.unwrap();

        let ns_dir = dir.path().join("signals");
        tokio::fs::write(ns_dir.join("late"), b"not json").await.unwrap();

        store.wait_for_init("signals", &|blob| blob == b"{}").await.unwrap();
        assert_eq!(
            store.read("signals", "late").await.unwrap(),
            Some(b"not json".to_vec())
        );
    }
}
