use super::{Partition, Strategy};
use async_trait::async_trait;
use std::sync::Arc;
use sworker_cache::{HttpRequest, HttpResponse};
use sworker_config::{NetworkClient, NetworkError};
use sworker_router::StrategyKind;
use tracing::{debug, warn};
use url::Url;

/// Cache-first images, refreshed in the background on every hit.
pub struct ImageStrategy {
    partition: Partition,
    network: Arc<dyn NetworkClient>,
    static_partition: Partition,
    placeholder: HttpRequest,
}

impl ImageStrategy {
    pub fn new(
        partition: Partition,
        network: Arc<dyn NetworkClient>,
        static_partition: Partition,
        placeholder: Url,
    ) -> Self {
        Self {
            partition,
            network,
            static_partition,
            placeholder: HttpRequest::get(placeholder),
        }
    }

    /// Re-fetch `request` and overwrite its entry on success. Returns
    /// whether the entry was replaced.
    pub async fn refresh(&self, request: &HttpRequest) -> bool {
        refresh_entry(&self.partition, self.network.as_ref(), request).await
    }

    fn spawn_refresh(&self, request: &HttpRequest) {
        let partition = self.partition.clone();
        let network = self.network.clone();
        let request = request.clone();
        tokio::spawn(async move {
            refresh_entry(&partition, network.as_ref(), &request).await;
        });
    }

    async fn placeholder(&self) -> Option<HttpResponse> {
        self.static_partition.lookup(&self.placeholder).await
    }
}

async fn refresh_entry(
    partition: &Partition,
    network: &dyn NetworkClient,
    request: &HttpRequest,
) -> bool {
    match network.fetch(request).await {
        Ok(response) if response.is_success() => partition.persist(request, &response).await,
        Ok(response) => {
            debug!(url = %request.url, status = response.status, "image refresh returned an error status");
            false
        }
        Err(e) => {
            warn!(url = %request.url, error = %e, "background image refresh failed");
            false
        }
    }
}

#[async_trait]
impl Strategy for ImageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Image
    }

    async fn handle(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        if let Some(cached) = self.partition.lookup(request).await {
            self.spawn_refresh(request);
            return Ok(cached);
        }

        match self.network.fetch(request).await {
            Ok(response) if response.is_success() => {
                self.partition.persist(request, &response).await;
                Ok(response)
            }
            Ok(response) => {
                debug!(url = %request.url, status = response.status, "image fetch returned an error status");
                Ok(self.placeholder().await.unwrap_or(response))
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "image fetch failed");
                Ok(self
                    .placeholder()
                    .await
                    .unwrap_or_else(|| HttpResponse::text(404, "Image not available")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedNetwork;
    use std::time::Duration;
    use sworker_cache::InMemoryPartitionStore;

    const LOGO: &str = "https://garage.test/images/logo.png";
    const PLACEHOLDER: &str = "https://garage.test/images/placeholder.svg";

    struct Fixture {
        strategy: ImageStrategy,
        images: Partition,
        statics: Partition,
        network: Arc<ScriptedNetwork>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryPartitionStore::new());
        let images = Partition::new(store.clone(), "images");
        let statics = Partition::new(store, "static");
        let network = Arc::new(ScriptedNetwork::new());
        let strategy = ImageStrategy::new(
            images.clone(),
            network.clone(),
            statics.clone(),
            Url::parse(PLACEHOLDER).unwrap(),
        );
        Fixture {
            strategy,
            images,
            statics,
            network,
        }
    }

    #[tokio::test]
    async fn test_hit_returns_cached_and_refreshes_in_background() {
        let f = fixture();
        let req = HttpRequest::parse_get(LOGO).unwrap();
        f.images.persist(&req, &HttpResponse::new(200, "old")).await;
        f.network.respond(LOGO, HttpResponse::new(200, "new"));

        let response = f.strategy.handle(&req).await.unwrap();
        assert_eq!(response.body_text(), "old");

        // Let the spawned refresh run.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(f.network.call_count(LOGO), 1);
        assert_eq!(f.images.lookup(&req).await.unwrap().body_text(), "new");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_entry() {
        let f = fixture();
        let req = HttpRequest::parse_get(LOGO).unwrap();
        f.images.persist(&req, &HttpResponse::new(200, "old")).await;
        f.network.set_offline(true);

        assert!(!f.strategy.refresh(&req).await);
        assert_eq!(f.strategy.handle(&req).await.unwrap().body_text(), "old");
        assert_eq!(f.images.lookup(&req).await.unwrap().body_text(), "old");
    }

    #[tokio::test]
    async fn test_miss_failure_serves_placeholder() {
        let f = fixture();
        let placeholder = HttpRequest::parse_get(PLACEHOLDER).unwrap();
        f.statics
            .persist(&placeholder, &HttpResponse::new(200, "<svg/>"))
            .await;
        f.network.set_offline(true);

        let response = f
            .strategy
            .handle(&HttpRequest::parse_get(LOGO).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text(), "<svg/>");
    }

    #[tokio::test]
    async fn test_miss_failure_without_placeholder_is_404() {
        let f = fixture();
        f.network.set_offline(true);

        let response = f
            .strategy
            .handle(&HttpRequest::parse_get(LOGO).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_error_status_without_placeholder_is_passed_through() {
        let f = fixture();
        f.network.respond(LOGO, HttpResponse::new(410, "gone"));
        let req = HttpRequest::parse_get(LOGO).unwrap();

        let response = f.strategy.handle(&req).await.unwrap();
        assert_eq!(response.status, 410);
        assert!(f.images.lookup(&req).await.is_none());
    }
}
