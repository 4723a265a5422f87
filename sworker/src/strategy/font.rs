use super::{Partition, Strategy};
use async_trait::async_trait;
use std::sync::Arc;
use sworker_cache::{CredentialsMode, HttpRequest, HttpResponse, RequestMode};
use sworker_config::{NetworkClient, NetworkError};
use sworker_router::StrategyKind;
use tracing::debug;

/// Cache-first fonts. Entries are immutable per deploy and never
/// revalidated.
pub struct FontStrategy {
    partition: Partition,
    network: Arc<dyn NetworkClient>,
}

impl FontStrategy {
    pub fn new(partition: Partition, network: Arc<dyn NetworkClient>) -> Self {
        Self { partition, network }
    }
}

#[async_trait]
impl Strategy for FontStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Font
    }

    async fn handle(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        if let Some(cached) = self.partition.lookup(request).await {
            return Ok(cached);
        }

        // Font CDNs reject credentialed cross-origin requests.
        let anonymous = request
            .clone()
            .with_mode(RequestMode::Cors)
            .with_credentials(CredentialsMode::Omit);

        let response = self.network.fetch(&anonymous).await.inspect_err(|e| {
            debug!(url = %request.url, error = %e, "font fetch failed, handing back to host");
        })?;
        self.partition.persist(request, &response).await;
        Ok(response)
    }
}
