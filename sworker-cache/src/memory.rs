//! In-memory implementation of the PartitionStore trait. Partitions keep
//! insertion order and hold at most one entry per normalized URL.
use crate::{CacheEntry, CacheError, HttpRequest, HttpResponse, PartitionStore};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

type Partitions = IndexMap<String, IndexMap<String, CacheEntry>>;

#[derive(Debug, Default)]
pub struct InMemoryPartitionStore {
    partitions: Mutex<Partitions>,
    max_entries_per_partition: Option<usize>,
}

impl InMemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses to grow a partition past `limit` entries, the
    /// way a browser store rejects writes once its quota is used up.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            partitions: Mutex::new(IndexMap::new()),
            max_entries_per_partition: Some(limit),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Partitions>, CacheError> {
        self.partitions
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))
    }
}

#[async_trait]
impl PartitionStore for InMemoryPartitionStore {
    async fn open(&self, partition: &str) -> Result<(), CacheError> {
        let mut partitions = self.lock()?;
        if !partitions.contains_key(partition) {
            debug!(partition, "creating cache partition");
            partitions.insert(partition.to_string(), IndexMap::new());
        }
        Ok(())
    }

    async fn partitions(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete(&self, partition: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.shift_remove(partition).is_some())
    }

    async fn get(
        &self,
        partition: &str,
        request: &HttpRequest,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let partitions = self.lock()?;
        Ok(partitions
            .get(partition)
            .and_then(|entries| entries.get(&request.cache_key()))
            .cloned())
    }

    async fn put(
        &self,
        partition: &str,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<(), CacheError> {
        if !request.is_get() {
            return Err(CacheError::UnsupportedMethod(request.method.clone()));
        }

        let key = request.cache_key();
        let mut partitions = self.lock()?;
        let entries = partitions.entry(partition.to_string()).or_default();

        if let Some(limit) = self.max_entries_per_partition {
            if !entries.contains_key(&key) && entries.len() >= limit {
                return Err(CacheError::QuotaExceeded {
                    partition: partition.to_string(),
                    limit,
                });
            }
        }

        entries.insert(key.clone(), CacheEntry::new(key, response));
        Ok(())
    }

    async fn remove(
        &self,
        partition: &str,
        request: &HttpRequest,
    ) -> Result<bool, CacheError> {
        let mut partitions = self.lock()?;
        Ok(partitions
            .get_mut(partition)
            .map(|entries| entries.shift_remove(&request.cache_key()).is_some())
            .unwrap_or(false))
    }

    async fn entry_count(&self, partition: &str) -> Result<usize, CacheError> {
        Ok(self
            .lock()?
            .get(partition)
            .map(IndexMap::len)
            .unwrap_or(0))
    }
}
