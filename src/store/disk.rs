use crate::core::cache::{Cache, CacheEntry};
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::debug;

/// Cache backed by a fjall partition. Keys and entries are stored as JSON so
/// the validity window survives process restarts.
pub struct DiskCache<K, V> {
    _keyspace: Keyspace,
    partition: PartitionHandle,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DiskCache<K, V>
where
    K: Serialize + Debug + Send + Sync,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    /// Opens (or creates) the partition `name` inside `keyspace`.
    pub fn open(keyspace: &Keyspace, name: &str) -> Result<Self> {
        let partition = keyspace.open_partition(name, PartitionCreateOptions::default())?;
        Ok(Self {
            _keyspace: keyspace.clone(),
            partition,
            _marker: PhantomData,
        })
    }

    fn read(&self, key: &K) -> Result<Option<CacheEntry<V>>> {
        let raw_key = serde_json::to_vec(key)?;
        let Some(bytes) = self.partition.get(&raw_key)? else {
            debug!("Cache MISS for key: {:?}", key);
            return Ok(None);
        };

        let entry: CacheEntry<V> = serde_json::from_slice(&bytes)?;
        if entry.is_expired() {
            debug!("Cache entry expired for key: {:?}", key);
            self.partition.remove(raw_key)?;
            return Ok(None);
        }
        debug!("Cache HIT for key: {:?}", key);
        Ok(Some(entry))
    }

    fn write(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(value, ttl);
        self.partition
            .insert(serde_json::to_vec(key)?, serde_json::to_vec(&entry)?)?;
        debug!("Cache PUT for key: {:?}", key);
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        let keys = self.partition.keys().collect::<Result<Vec<_>, _>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for DiskCache<K, V>
where
    K: Serialize + Debug + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get_entry(&self, key: &K) -> Option<CacheEntry<V>> {
        self.read(key).unwrap_or_else(|e| {
            debug!("DiskCache get error: {}", e);
            None
        })
    }

    async fn get(&self, key: &K) -> Option<V> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        if let Err(e) = self.write(&key, value, ttl) {
            debug!("DiskCache put error: {}", e);
        }
    }

    async fn remove(&self, key: &K) {
        let res: Result<()> = serde_json::to_vec(key)
            .map_err(anyhow::Error::from)
            .and_then(|raw_key| Ok(self.partition.remove(raw_key)?));
        if let Err(e) = res {
            debug!("DiskCache remove error: {}", e);
        }
    }

    async fn clear(&self) {
        if let Err(e) = self.remove_all() {
            debug!("DiskCache clear error: {}", e);
        }
    }
}
