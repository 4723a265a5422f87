use crate::{CacheEntry, CacheError, HttpRequest, HttpResponse};
use async_trait::async_trait;
use tracing::warn;

/// Storage of named cache partitions that backends must implement.
///
/// Each call is atomic on its own; there are no transactions spanning
/// several calls, so two concurrent misses for the same URL may both write
/// it back. The last write wins.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Create the partition if it does not exist yet.
    async fn open(&self, partition: &str) -> Result<(), CacheError>;

    /// Names of every existing partition, in creation order.
    async fn partitions(&self) -> Result<Vec<String>, CacheError>;

    /// Drop a partition with all its entries. Returns whether it existed.
    async fn delete(&self, partition: &str) -> Result<bool, CacheError>;

    /// Look up the entry stored for `request`. A missing partition is a miss.
    async fn get(
        &self,
        partition: &str,
        request: &HttpRequest,
    ) -> Result<Option<CacheEntry>, CacheError>;

    /// Store (or replace) the response for `request`, creating the
    /// partition lazily. Only GET requests are accepted.
    async fn put(
        &self,
        partition: &str,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<(), CacheError>;

    /// Remove one entry. Returns whether it existed.
    async fn remove(
        &self,
        partition: &str,
        request: &HttpRequest,
    ) -> Result<bool, CacheError>;

    /// Number of entries in a partition, zero if it does not exist.
    async fn entry_count(&self, partition: &str) -> Result<usize, CacheError>;

    /// Delete every existing partition. Returns how many were removed, so
    /// a second call in a row reports zero.
    async fn clear_all(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for name in self.partitions().await? {
            match self.delete(&name).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(partition = %name, error = %e, "failed to delete partition");
                    return Err(e);
                }
            }
        }
        Ok(removed)
    }
}
