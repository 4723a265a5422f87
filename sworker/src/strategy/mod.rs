//! Handling policies for intercepted requests. Each strategy owns the
//! partition it reads and writes, and reaches the network only through the
//! injected [`NetworkClient`](sworker_config::NetworkClient).
use async_trait::async_trait;
use std::{fmt, sync::Arc};
use sworker_cache::{HttpRequest, HttpResponse, PartitionStore};
use sworker_config::NetworkError;
use sworker_router::StrategyKind;
use tracing::{debug, warn};

pub mod api;
pub mod font;
pub mod image;
pub mod network_first;
pub mod static_shell;

pub use api::ApiStrategy;
pub use font::FontStrategy;
pub use image::ImageStrategy;
pub use network_first::NetworkFirstStrategy;
pub use static_shell::{OfflinePage, StaticShellStrategy};

/// A request handling policy bound to a partition.
///
/// Implementations resolve to some response on every path. The only
/// exception is [`FontStrategy`], which hands a failed miss back as `Err`
/// so the host can retry the fetch without interception.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn handle(&self, request: &HttpRequest)
    -> Result<HttpResponse, NetworkError>;
}

/// One named partition of the shared store.
#[derive(Clone)]
pub struct Partition {
    store: Arc<dyn PartitionStore>,
    name: String,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("name", &self.name).finish()
    }
}

impl Partition {
    pub fn new(store: Arc<dyn PartitionStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached response for `request`. Read failures count as a miss.
    pub async fn lookup(&self, request: &HttpRequest) -> Option<HttpResponse> {
        match self.store.get(&self.name, request).await {
            Ok(entry) => entry.map(|entry| entry.response),
            Err(e) => {
                warn!(partition = %self.name, url = %request.url, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write a successful response. Error statuses are never stored, and a
    /// failed write is logged without affecting the caller.
    pub async fn persist(&self, request: &HttpRequest, response: &HttpResponse) -> bool {
        if !response.is_success() {
            return false;
        }
        match self.store.put(&self.name, request, response.clone()).await {
            Ok(()) => {
                debug!(partition = %self.name, url = %request.url, "cached response");
                true
            }
            Err(e) => {
                warn!(partition = %self.name, url = %request.url, error = %e, "cache write failed");
                false
            }
        }
    }
}
