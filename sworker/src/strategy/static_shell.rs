use super::{Partition, Strategy};
use async_trait::async_trait;
use std::sync::Arc;
use sworker_cache::{HttpRequest, HttpResponse};
use sworker_config::{NetworkClient, NetworkError};
use sworker_router::StrategyKind;
use tracing::{debug, warn};
use url::Url;

const OFFLINE_NOTICE: &str = "<!DOCTYPE html>\
<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>You are offline</h1>\
<p>Check your connection and try again.</p></body></html>";

/// The offline fallback document kept in the static partition.
#[derive(Debug, Clone)]
pub struct OfflinePage {
    partition: Partition,
    request: HttpRequest,
}

impl OfflinePage {
    pub fn new(partition: Partition, url: Url) -> Self {
        Self {
            partition,
            request: HttpRequest::get(url),
        }
    }

    pub fn url(&self) -> &Url {
        &self.request.url
    }

    /// The cached offline page, or an inline notice. Never fails.
    pub async fn serve(&self) -> HttpResponse {
        match self.partition.lookup(&self.request).await {
            Some(page) => page,
            None => {
                debug!(url = %self.request.url, "offline page not cached, using inline notice");
                HttpResponse::html(200, OFFLINE_NOTICE)
            }
        }
    }
}

/// Cache-first handling of the app shell.
pub struct StaticShellStrategy {
    partition: Partition,
    network: Arc<dyn NetworkClient>,
    offline: OfflinePage,
}

impl StaticShellStrategy {
    pub fn new(
        partition: Partition,
        network: Arc<dyn NetworkClient>,
        offline: OfflinePage,
    ) -> Self {
        Self {
            partition,
            network,
            offline,
        }
    }
}

#[async_trait]
impl Strategy for StaticShellStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticShell
    }

    async fn handle(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        if let Some(cached) = self.partition.lookup(request).await {
            return Ok(cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.partition.persist(request, &response).await;
                Ok(response)
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "static asset unavailable, serving offline page");
                Ok(self.offline.serve().await)
            }
        }
    }
}
