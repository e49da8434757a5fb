use std::io;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;
use crate::{CacheKey, CacheStore, StoredEntry};

/// A store that persists entries as serialized envelopes below a root
/// directory.
///
/// Entries live at the key's [`cache_path`](CacheKey::cache_path) relative to
/// the root. Writes go through a temp file in a sibling `.tmp` directory and
/// are atomically persisted into place, so concurrent readers never observe
/// a partially written entry.
pub struct FilesystemStore<V> {
    root: PathBuf,
    _values: PhantomData<fn() -> V>,
}

impl<V> FilesystemStore<V> {
    /// Creates a store rooted at `path`. The directory is created if it does
    /// not exist.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let root = path.into();
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            _values: PhantomData,
        })
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.cache_path())
    }
}

#[async_trait]
impl<V> CacheStore<V> for FilesystemStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<StoredEntry<V>>, StoreError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry<V> = serde_json::from_slice(&bytes)?;
        Ok(Some(entry).filter(|entry| !entry.is_expired()))
    }

    async fn set(&self, key: &CacheKey, value: V, ttl: Duration) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&StoredEntry::new(value, ttl))?;

        let path = self.entry_path(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).await?;

        let tmp_dir = self.root.join(".tmp");
        fs::create_dir_all(&tmp_dir).await?;

        let temp_file = NamedTempFile::new_in(&tmp_dir)?;
        let dup_file = temp_file.reopen()?;
        let mut dest = fs::File::from_std(dup_file);
        dest.write_all(&bytes).await?;
        dest.flush().await?;

        temp_file.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
