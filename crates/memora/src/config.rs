use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::store::{CacheStore, FilesystemStore, InMemoryStore};

/// Options for a [`Cacher`](crate::Cacher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache identifier used in log records.
    #[serde(default = "default_name")]
    pub name: String,

    /// An upper bound on the runtime of a single computation.
    ///
    /// When set, a computation running longer than this resolves to
    /// [`CacheError::Timeout`](crate::CacheError::Timeout) for every waiter
    /// and is not cached.
    #[serde(default, with = "humantime_serde")]
    pub compute_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            compute_timeout: None,
        }
    }
}

fn default_name() -> String {
    "default".into()
}

/// Configuration for a bounded in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryStoreConfig {
    /// The maximum number of entries kept in memory.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

fn default_max_capacity() -> u64 {
    100 * 1024
}

/// Configuration for a store persisting entries below a root directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemStoreConfig {
    /// Directory to store cache entries in. Created if it does not exist.
    pub path: PathBuf,
}

/// The backend to use for a cache store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreConfig {
    /// A bounded in-memory store.
    InMemory(InMemoryStoreConfig),
    /// A store persisting entries below a root directory.
    Filesystem(FilesystemStoreConfig),
}

impl StoreConfig {
    /// Builds the configured store backend.
    pub fn create_store<V>(&self) -> std::io::Result<Arc<dyn CacheStore<V>>>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Ok(match self {
            StoreConfig::InMemory(config) => Arc::new(InMemoryStore::new(config.max_capacity)),
            StoreConfig::Filesystem(config) => Arc::new(FilesystemStore::new(&config.path)?),
        })
    }
}
