use super::{OfflinePage, Partition, Strategy};
use async_trait::async_trait;
use std::sync::Arc;
use sworker_cache::{HttpRequest, HttpResponse};
use sworker_config::{NetworkClient, NetworkError};
use sworker_router::StrategyKind;
use tracing::{debug, warn};

/// Network-first with a cache fallback, used for documents and for
/// same-origin assets nothing else claims. Successful responses are kept
/// in the static partition.
pub struct NetworkFirstStrategy {
    kind: StrategyKind,
    partition: Partition,
    network: Arc<dyn NetworkClient>,
    offline: Option<OfflinePage>,
}

impl NetworkFirstStrategy {
    /// Documents: falls back to the offline page when nothing is cached.
    pub fn page(
        partition: Partition,
        network: Arc<dyn NetworkClient>,
        offline: OfflinePage,
    ) -> Self {
        Self {
            kind: StrategyKind::Page,
            partition,
            network,
            offline: Some(offline),
        }
    }

    pub fn fallback(partition: Partition, network: Arc<dyn NetworkClient>) -> Self {
        Self {
            kind: StrategyKind::Default,
            partition,
            network,
            offline: None,
        }
    }
}

#[async_trait]
impl Strategy for NetworkFirstStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn handle(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        match self.network.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.partition.persist(request, &response).await;
                Ok(response)
            }
            Ok(response) => {
                debug!(url = %request.url, status = response.status, "error status, trying cache");
                Ok(self.partition.lookup(request).await.unwrap_or(response))
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, strategy = %self.kind, "network failed, trying cache");
                if let Some(cached) = self.partition.lookup(request).await {
                    return Ok(cached);
                }
                Ok(match &self.offline {
                    Some(offline) => offline.serve().await,
                    None => HttpResponse::text(503, "Service Unavailable"),
                })
            }
        }
    }
}
