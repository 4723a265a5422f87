//! Partitioned response cache for the sworker interception layer.
//!
//! This crate holds the request/response model shared by every layer, the
//! versioned partition registry and the trait-based partition store with an
//! in-memory backend.
//!
//! Partitions are named `"{prefix}-{role}-v{version}"`. Bumping the version
//! is the only way to invalidate a whole class of cached responses: the
//! activation sweep keeps the current names and deletes everything else.

mod cache;
mod error;
mod memory;
mod partition;
mod request;
mod store;

pub use cache::{CacheEntry, HttpResponse};
pub use error::CacheError;
pub use memory::InMemoryPartitionStore;
pub use partition::{PartitionRegistry, PartitionRole};
pub use request::{CacheMode, CredentialsMode, HttpRequest, RequestMode};
pub use store::PartitionStore;

// Re-export
pub use bytes;
pub use url;
