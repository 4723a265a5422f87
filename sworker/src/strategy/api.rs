use super::{Partition, Strategy};
use crate::booking;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use sworker_cache::{HttpRequest, HttpResponse};
use sworker_config::{NetworkClient, NetworkError, RetryExecutor};
use sworker_router::StrategyKind;
use tracing::{debug, warn};

/// Network-first handling of API calls with retries, booking validation
/// and a cache fallback.
pub struct ApiStrategy {
    partition: Partition,
    network: Arc<dyn NetworkClient>,
    retry: RetryExecutor,
    booking_listing: String,
}

impl ApiStrategy {
    pub fn new(
        partition: Partition,
        network: Arc<dyn NetworkClient>,
        retry: RetryExecutor,
        booking_listing: impl Into<String>,
    ) -> Self {
        Self {
            partition,
            network,
            retry,
            booking_listing: booking_listing.into(),
        }
    }

    /// Body served when the network is gone and nothing is cached.
    pub fn unavailable() -> HttpResponse {
        HttpResponse::json(
            503,
            &json!({
                "error": "network_unavailable",
                "message": "Can't reach the server. Check your connection and try again.",
            }),
        )
    }

    async fn on_success(
        &self,
        request: &HttpRequest,
        response: HttpResponse,
    ) -> HttpResponse {
        if !booking::is_booking_listing(&request.url, &self.booking_listing) {
            self.partition.persist(request, &response).await;
            return response;
        }

        match booking::validate_response(&response) {
            Ok(validated) => {
                self.partition.persist(request, &validated).await;
                validated
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "booking listing failed validation, caching as received");
                self.partition.persist(request, &response).await;
                response
            }
        }
    }
}

#[async_trait]
impl Strategy for ApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn handle(
        &self,
        request: &HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        let cached = self.partition.lookup(request).await;

        match self.retry.execute(self.network.as_ref(), request).await {
            Ok(response) if response.is_success() => {
                Ok(self.on_success(request, response).await)
            }
            Ok(response) => {
                debug!(url = %request.url, status = response.status, "api returned an error status");
                Ok(cached.unwrap_or(response))
            }
            Err(e) => match cached {
                Some(cached) => {
                    warn!(url = %request.url, error = %e, "api unreachable, serving cached response");
                    Ok(cached)
                }
                None => {
                    warn!(url = %request.url, error = %e, "api unreachable and nothing cached");
                    Ok(Self::unavailable())
                }
            },
        }
    }
}
