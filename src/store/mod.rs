pub mod disk;
pub mod memory;

use crate::core::cache::Cache;
use disk::DiskCache;
use fjall::Keyspace;
use memory::MemoryCache;
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Hands out named cache collections. Collections are persisted in a fjall
/// keyspace when one could be opened, and kept in memory otherwise.
pub struct CacheStore {
    keyspace: Option<Keyspace>,
}

impl CacheStore {
    /// Opens the persistent keyspace under `data_path/cache`, falling back to
    /// memory collections if it cannot be opened.
    pub fn open(data_path: &Path) -> Self {
        let cache_dir = data_path.join("cache");
        let keyspace = match fjall::Config::new(&cache_dir).open() {
            Ok(keyspace) => {
                debug!("Opened cache keyspace at {}", cache_dir.display());
                Some(keyspace)
            }
            Err(e) => {
                warn!(
                    "Failed to open cache at {}, using memory cache: {e}",
                    cache_dir.display()
                );
                None
            }
        };
        Self { keyspace }
    }

    pub fn in_memory() -> Self {
        Self { keyspace: None }
    }

    pub fn is_persistent(&self) -> bool {
        self.keyspace.is_some()
    }

    pub fn collection<V>(&self, name: &str) -> Arc<dyn Cache<String, V>>
    where
        V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if let Some(keyspace) = &self.keyspace {
            match DiskCache::<String, V>::open(keyspace, name) {
                Ok(cache) => return Arc::new(cache),
                Err(e) => warn!("Failed to open cache partition {name}, using memory cache: {e}"),
            }
        }
        Arc::new(MemoryCache::<String, V>::new())
    }
}
